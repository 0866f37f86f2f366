use std::cmp::Ordering;

use chrono::{DateTime, Local, Utc};

const VIEWER_URL_PREFIX: &str = "https://drive.google.com/file/d/";

/// Numeric portion of a season key: every digit in the key, concatenated.
/// Keys without digits ("Extras") count as season 0.
pub(crate) fn season_number(key: &str) -> u64 {
    let digits = key
        .chars()
        .filter(char::is_ascii_digit)
        .collect::<String>();
    if digits.is_empty() {
        return 0;
    }
    digits.parse::<u64>().unwrap_or(u64::MAX)
}

pub(crate) fn has_season_digits(key: &str) -> bool {
    key.chars().any(|ch| ch.is_ascii_digit())
}

pub(crate) fn compare_season_keys(a: &str, b: &str) -> Ordering {
    season_number(a)
        .cmp(&season_number(b))
        .then_with(|| a.cmp(b))
}

pub(crate) fn sort_season_keys<'a>(keys: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
    let mut keys = keys.into_iter().collect::<Vec<_>>();
    keys.sort_by(|left, right| compare_season_keys(left, right));
    keys
}

/// Starting season for a series with no watch history: the lowest numbered
/// season, falling back to label-only seasons when nothing is numbered.
pub(crate) fn first_season<'a>(keys: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    let ordered = sort_season_keys(keys);
    ordered
        .iter()
        .copied()
        .find(|key| has_season_digits(key))
        .or_else(|| ordered.first().copied())
}

/// "T2" -> "2", "Extras" -> "Extras".
pub(crate) fn season_label(key: &str) -> String {
    key.replacen('T', "", 1)
}

pub(crate) fn episode_heading(
    season: &str,
    number: Option<u32>,
    index: usize,
    title: &str,
) -> String {
    let number = number.map_or(index as u64 + 1, u64::from);
    format!("T{} E{number} - {title}", season_label(season))
}

pub(crate) fn history_title(series_title: &str, season: &str) -> String {
    format!("{series_title}: T{}", season_label(season))
}

/// Share of a season already seen, given its stored resume index.
pub(crate) fn season_progress_percent(resume_index: usize, total_episodes: usize) -> u8 {
    if total_episodes == 0 {
        return 0;
    }
    let watched = if resume_index > 0 { resume_index + 1 } else { 0 };
    let ratio = watched.min(total_episodes) as f64 / total_episodes as f64;
    (ratio * 100.0).round() as u8
}

pub(crate) fn viewer_url(video_id: &str) -> String {
    format!("{VIEWER_URL_PREFIX}{video_id}/preview")
}

pub(crate) fn language_display(language: &str) -> String {
    match language {
        "en" => "Original".to_string(),
        "es" => "Español".to_string(),
        other => other.to_uppercase(),
    }
}

/// Next language in the rotation `default`, then the offered ones. `None` when
/// there is nothing to switch to.
pub(crate) fn next_language(current: &str, default: &str, offered: &[String]) -> Option<String> {
    let mut options = vec![default];
    for language in offered {
        if !options.contains(&language.as_str()) {
            options.push(language.as_str());
        }
    }
    if options.len() < 2 {
        return None;
    }
    let next = options
        .iter()
        .position(|option| *option == current)
        .map_or(0, |index| (index + 1) % options.len());
    Some(options[next].to_string())
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    let mut out = s.to_string();
    if out.chars().count() > max {
        out = out.chars().take(max.saturating_sub(3)).collect::<String>() + "...";
    }
    out
}

pub(crate) fn format_viewed_at(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| {
            dt.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M %:z")
                .to_string()
        })
        .unwrap_or_else(|| millis.to_string())
}
