use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::episode::sort_season_keys;

/// Video map key for the language-neutral identifier.
pub(crate) const DEFAULT_VIDEO_KEY: &str = "default";

const VIDEO_FIELD: &str = "videoId";
const VIDEO_FIELD_PREFIX: &str = "videoId_";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Episode {
    pub(crate) number: Option<u32>,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) thumbnail: Option<String>,
    pub(crate) videos: BTreeMap<String, String>,
}

impl Episode {
    /// Language-specific identifier when present, else the language-neutral one.
    pub(crate) fn video_for(&self, language: &str) -> Option<&str> {
        self.videos
            .get(language)
            .filter(|_| language != DEFAULT_VIDEO_KEY)
            .or_else(|| self.videos.get(DEFAULT_VIDEO_KEY))
            .map(String::as_str)
    }

    pub(crate) fn languages(&self) -> Vec<&str> {
        self.videos
            .keys()
            .map(String::as_str)
            .filter(|key| *key != DEFAULT_VIDEO_KEY)
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Series {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) poster: Option<String>,
    pub(crate) season_posters: HashMap<String, String>,
    pub(crate) seasons: BTreeMap<String, Vec<Episode>>,
}

impl Series {
    pub(crate) fn episodes(&self, season: &str) -> Option<&[Episode]> {
        self.seasons.get(season).map(Vec::as_slice)
    }

    pub(crate) fn episode(&self, season: &str, index: usize) -> Option<&Episode> {
        self.episodes(season)?.get(index)
    }

    pub(crate) fn season_count(&self) -> usize {
        self.seasons.len()
    }

    /// Season keys in grid order.
    pub(crate) fn ordered_seasons(&self) -> Vec<&str> {
        sort_season_keys(self.seasons.keys().map(String::as_str))
    }

    pub(crate) fn season_poster(&self, season: &str) -> Option<&str> {
        self.season_posters
            .get(season)
            .or(self.poster.as_ref())
            .map(String::as_str)
    }

    pub(crate) fn total_episodes(&self) -> usize {
        self.seasons.values().map(Vec::len).sum()
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Movie {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) poster: Option<String>,
    pub(crate) videos: BTreeMap<String, String>,
}

/// Read-only view of the loaded catalog.
pub(crate) trait CatalogProvider: Send + Sync {
    fn get_series(&self, id: &str) -> Option<Arc<Series>>;
    fn get_movie(&self, id: &str) -> Option<Arc<Movie>>;
    fn all_series(&self) -> Vec<Arc<Series>>;
}

#[derive(Debug, Default)]
pub(crate) struct Catalog {
    series: BTreeMap<String, Arc<Series>>,
    movies: BTreeMap<String, Arc<Movie>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCatalog {
    #[serde(default)]
    series: HashMap<String, RawTitle>,
    #[serde(default)]
    series_episodes: HashMap<String, HashMap<String, Value>>,
    #[serde(default)]
    season_posters: HashMap<String, HashMap<String, String>>,
    #[serde(default)]
    movies: HashMap<String, Map<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTitle {
    #[serde(default)]
    title: String,
    #[serde(default)]
    poster: Option<String>,
}

impl Catalog {
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog at {}", path.display()))?;
        Self::from_json_str(&raw)
            .with_context(|| format!("failed to parse catalog at {}", path.display()))
    }

    pub(crate) fn from_json_str(raw: &str) -> Result<Self> {
        let mut parsed: RawCatalog = serde_json::from_str(raw)?;

        let mut ids = parsed.series.keys().cloned().collect::<Vec<_>>();
        for id in parsed.series_episodes.keys() {
            if !parsed.series.contains_key(id) {
                ids.push(id.clone());
            }
        }

        let mut series = BTreeMap::new();
        for id in ids {
            let info = parsed.series.remove(&id).unwrap_or_default();
            let seasons = parsed
                .series_episodes
                .remove(&id)
                .unwrap_or_default()
                .into_iter()
                .map(|(season, value)| (season, parse_season(&value)))
                .collect();
            let title = if info.title.trim().is_empty() {
                id.clone()
            } else {
                info.title
            };
            let entry = Series {
                id: id.clone(),
                title,
                poster: info.poster.filter(|poster| !poster.trim().is_empty()),
                season_posters: parsed.season_posters.remove(&id).unwrap_or_default(),
                seasons,
            };
            series.insert(id, Arc::new(entry));
        }

        let movies = parsed
            .movies
            .into_iter()
            .map(|(id, fields)| {
                let movie = Movie {
                    id: id.clone(),
                    title: string_field(&fields, "title").unwrap_or_else(|| id.clone()),
                    poster: string_field(&fields, "poster"),
                    videos: collect_videos(&fields),
                };
                (id, Arc::new(movie))
            })
            .collect();

        Ok(Self { series, movies })
    }

    #[cfg(test)]
    pub(crate) fn with_series(series: Vec<Series>) -> Self {
        Self {
            series: series
                .into_iter()
                .map(|entry| (entry.id.clone(), Arc::new(entry)))
                .collect(),
            movies: BTreeMap::new(),
        }
    }
}

impl CatalogProvider for Catalog {
    fn get_series(&self, id: &str) -> Option<Arc<Series>> {
        self.series.get(id).cloned()
    }

    fn get_movie(&self, id: &str) -> Option<Arc<Movie>> {
        self.movies.get(id).cloned()
    }

    fn all_series(&self) -> Vec<Arc<Series>> {
        let mut all = self.series.values().cloned().collect::<Vec<_>>();
        all.sort_by(|left, right| left.title.to_lowercase().cmp(&right.title.to_lowercase()));
        all
    }
}

fn parse_season(value: &Value) -> Vec<Episode> {
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => map.values().collect(),
        _ => Vec::new(),
    };

    let mut episodes = items
        .into_iter()
        .filter_map(Value::as_object)
        .map(parse_episode)
        .collect::<Vec<_>>();
    // Stable: unnumbered episodes keep their relative order after numbered ones.
    episodes.sort_by_key(|episode| episode.number.unwrap_or(u32::MAX));
    episodes
}

fn parse_episode(fields: &Map<String, Value>) -> Episode {
    Episode {
        number: fields.get("episodeNumber").and_then(parse_number),
        title: string_field(fields, "title").unwrap_or_default(),
        description: string_field(fields, "description").unwrap_or_default(),
        thumbnail: string_field(fields, "thumbnail"),
        videos: collect_videos(fields),
    }
}

fn parse_number(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(text) => text.trim().parse::<u32>().ok(),
        _ => None,
    }
}

fn string_field(fields: &Map<String, Value>, name: &str) -> Option<String> {
    match fields.get(name)? {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// `videoId` lands under [`DEFAULT_VIDEO_KEY`], `videoId_<lang>` under `<lang>`.
fn collect_videos(fields: &Map<String, Value>) -> BTreeMap<String, String> {
    let mut videos = BTreeMap::new();
    for (name, value) in fields {
        let key = if name == VIDEO_FIELD {
            DEFAULT_VIDEO_KEY.to_string()
        } else if let Some(language) = name.strip_prefix(VIDEO_FIELD_PREFIX)
            && !language.is_empty()
        {
            language.to_lowercase()
        } else {
            continue;
        };
        if let Some(id) = value.as_str().map(str::trim).filter(|id| !id.is_empty()) {
            videos.insert(key, id.to_string());
        }
    }
    videos
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "series": {
            "show": { "title": "The Show", "poster": "show.jpg" },
            "empty": { "title": "Nothing Yet" }
        },
        "seriesEpisodes": {
            "show": {
                "T2": [
                    { "episodeNumber": 2, "title": "Second", "videoId": "v2" },
                    { "episodeNumber": "1", "title": "First", "videoId": "v1", "videoId_es": "v1-es" }
                ],
                "Extras": { "a": { "title": "Bloopers", "videoId_en": " " } }
            },
            "orphan": { "T1": [ { "title": "Pilot" } ] }
        },
        "seasonPosters": { "show": { "T2": "t2.jpg" } },
        "movies": {
            "film": { "title": "A Film", "videoId_en": "f-en", "videoId_es": "f-es" }
        }
    }"#;

    #[test]
    fn parses_series_seasons_and_orders_episodes_by_number() {
        let catalog = Catalog::from_json_str(SAMPLE).expect("catalog should parse");
        let show = catalog.get_series("show").expect("show exists");
        let t2 = show.episodes("T2").expect("season exists");
        assert_eq!(t2[0].title, "First");
        assert_eq!(t2[0].number, Some(1));
        assert_eq!(t2[1].title, "Second");
        assert_eq!(show.season_poster("T2"), Some("t2.jpg"));
        assert_eq!(show.season_poster("Extras"), Some("show.jpg"));
    }

    #[test]
    fn collects_language_keyed_video_ids_and_skips_blank_ones() {
        let catalog = Catalog::from_json_str(SAMPLE).expect("catalog should parse");
        let show = catalog.get_series("show").expect("show exists");
        let first = show.episode("T2", 0).expect("episode exists");
        assert_eq!(first.video_for("es"), Some("v1-es"));
        assert_eq!(first.video_for("en"), Some("v1"));
        assert_eq!(first.languages(), vec!["es"]);

        let bloopers = show.episode("Extras", 0).expect("episode exists");
        assert!(bloopers.videos.is_empty());
        assert_eq!(bloopers.video_for("en"), None);
    }

    #[test]
    fn series_without_metadata_or_episodes_are_still_listed() {
        let catalog = Catalog::from_json_str(SAMPLE).expect("catalog should parse");
        let orphan = catalog.get_series("orphan").expect("orphan exists");
        assert_eq!(orphan.title, "orphan");
        let empty = catalog.get_series("empty").expect("empty exists");
        assert_eq!(empty.season_count(), 0);
        assert_eq!(catalog.all_series().len(), 3);
    }

    #[test]
    fn parses_movies() {
        let catalog = Catalog::from_json_str(SAMPLE).expect("catalog should parse");
        let film = catalog.get_movie("film").expect("movie exists");
        assert_eq!(film.title, "A Film");
        assert_eq!(film.videos.get("en").map(String::as_str), Some("f-en"));
    }
}
