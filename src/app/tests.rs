use super::episode::*;

#[test]
fn season_number_concatenates_every_digit() {
    assert_eq!(season_number("T2"), 2);
    assert_eq!(season_number("Season 10"), 10);
    assert_eq!(season_number("T1b2"), 12);
    assert_eq!(season_number("Extras"), 0);
}

#[test]
fn season_number_saturates_on_overflow() {
    assert_eq!(season_number("T99999999999999999999999"), u64::MAX);
}

#[test]
fn season_keys_sort_numerically_with_labels_first() {
    let ordered = sort_season_keys(["T10", "Extras", "T2", "T1"]);
    assert_eq!(ordered, vec!["Extras", "T1", "T2", "T10"]);
}

#[test]
fn season_keys_with_same_number_sort_by_key() {
    let ordered = sort_season_keys(["T2", "Bonus", "S2", "Extras"]);
    assert_eq!(ordered, vec!["Bonus", "Extras", "S2", "T2"]);
}

#[test]
fn first_season_prefers_numbered_seasons() {
    assert_eq!(first_season(["Extras", "T2", "T1"]), Some("T1"));
    assert_eq!(first_season(["T3", "Extras"]), Some("T3"));
}

#[test]
fn first_season_falls_back_to_labels() {
    assert_eq!(first_season(["Extras", "Bonus"]), Some("Bonus"));
    assert_eq!(first_season(std::iter::empty::<&str>()), None);
}

#[test]
fn season_label_drops_leading_marker() {
    assert_eq!(season_label("T2"), "2");
    assert_eq!(season_label("Extras"), "Extras");
}

#[test]
fn episode_heading_prefers_catalog_number() {
    assert_eq!(episode_heading("T2", Some(5), 0, "Pilot"), "T2 E5 - Pilot");
    assert_eq!(episode_heading("T2", None, 3, "Finale"), "T2 E4 - Finale");
    assert_eq!(episode_heading("Extras", None, 0, ""), "TExtras E1 - ");
}

#[test]
fn history_title_names_series_and_season() {
    assert_eq!(history_title("The Show", "T3"), "The Show: T3");
}

#[test]
fn season_progress_counts_resume_episode_as_seen() {
    assert_eq!(season_progress_percent(0, 10), 0);
    assert_eq!(season_progress_percent(4, 10), 50);
    assert_eq!(season_progress_percent(1, 3), 67);
    assert_eq!(season_progress_percent(9, 10), 100);
}

#[test]
fn season_progress_is_clamped() {
    assert_eq!(season_progress_percent(12, 10), 100);
    assert_eq!(season_progress_percent(3, 0), 0);
}

#[test]
fn viewer_url_embeds_video_id() {
    assert_eq!(
        viewer_url("abc123"),
        "https://drive.google.com/file/d/abc123/preview"
    );
}

#[test]
fn language_display_names_known_languages() {
    assert_eq!(language_display("en"), "Original");
    assert_eq!(language_display("es"), "Español");
    assert_eq!(language_display("fr"), "FR");
}

#[test]
fn next_language_rotates_through_default_and_offered() {
    let offered = vec!["es".to_string()];
    assert_eq!(next_language("en", "en", &offered), Some("es".to_string()));
    assert_eq!(next_language("es", "en", &offered), Some("en".to_string()));
    assert_eq!(next_language("fr", "en", &offered), Some("en".to_string()));
}

#[test]
fn next_language_needs_an_alternative() {
    assert_eq!(next_language("en", "en", &[]), None);
    assert_eq!(next_language("en", "en", &["en".to_string()]), None);
}

#[test]
fn truncate_adds_ellipsis_only_when_needed() {
    assert_eq!(truncate("abcdefghij", 6), "abc...");
    assert_eq!(truncate("short", 6), "short");
    assert_eq!(truncate("ñandúñandú", 5), "ña...");
}

#[test]
fn format_viewed_at_falls_back_to_raw_millis() {
    assert_eq!(format_viewed_at(i64::MAX), i64::MAX.to_string());
    assert!(format_viewed_at(1_700_000_000_000).starts_with("2023-11-1"));
}
