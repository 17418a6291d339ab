//! Row parsing and cleaning.
//!
//! Turns raw CSV rows into typed [`ListeningRecord`]s, normalizes missing
//! values to `None`, and collapses duplicate track/artist pairs.

use super::schema::ColumnMap;
use crate::models::{AudioFeatures, CleanReport, ListeningRecord};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::collections::HashSet;
use tracing::{debug, info};

const SPOTIFY_TRACK_URI: &str = "spotify:track:";
const SPOTIFY_TRACK_URL: &str = "open.spotify.com/track/";

/// Options for the cleaning pass.
#[derive(Debug, Clone)]
pub struct CleanOptions {
    /// Drop rows that lack a track or artist name.
    pub drop_incomplete: bool,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            drop_incomplete: true,
        }
    }
}

/// Years a plausible `added_at` can fall in.
const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1..=9999;

/// Parse an `added_at` value.
///
/// Accepts RFC 3339 plus a few naive layouts (interpreted as UTC).
/// Anything else, including years outside 1..=9999, is treated as missing.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    parse_any_layout(raw.trim()).filter(|dt| YEAR_RANGE.contains(&dt.year()))
}

fn parse_any_layout(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for layout in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, layout) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Reduce a Spotify track URI or share URL to the bare track id.
///
/// Values in any other shape are kept as-is since the id is opaque.
pub fn extract_track_id(raw: &str) -> String {
    if let Some(id) = raw.strip_prefix(SPOTIFY_TRACK_URI) {
        return id.to_string();
    }

    if let Some(pos) = raw.find(SPOTIFY_TRACK_URL) {
        let rest = &raw[pos + SPOTIFY_TRACK_URL.len()..];
        let end = rest.find(['?', '/', '#']).unwrap_or(rest.len());
        return rest[..end].to_string();
    }

    raw.to_string()
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_duration(raw: &str) -> Option<u64> {
    raw.parse::<u64>().ok().or_else(|| {
        parse_number(raw)
            .filter(|v| *v >= 0.0)
            .map(|v| v.round() as u64)
    })
}

/// Convert raw rows into records using the resolved column positions.
///
/// Returns the records in input order and the number of rows whose date
/// column held a value that could not be parsed.
pub fn parse_rows(rows: &[Vec<String>], columns: &ColumnMap) -> (Vec<ListeningRecord>, usize) {
    let mut unparseable_dates = 0;

    let records = rows
        .iter()
        .map(|row| {
            let field = |index: Option<usize>| {
                index
                    .and_then(|i| row.get(i))
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
            };
            let text = |index: Option<usize>| field(index).map(String::from);
            let number = |index: Option<usize>| field(index).and_then(parse_number);

            let added_at = field(columns.added_at).and_then(|raw| {
                let parsed = parse_timestamp(raw);
                if parsed.is_none() {
                    debug!("Unparseable date treated as missing: {:?}", raw);
                    unparseable_dates += 1;
                }
                parsed
            });

            ListeningRecord {
                track_id: field(columns.track_id).map(extract_track_id),
                track_name: text(columns.track_name),
                artist_name: text(columns.artist_name),
                album_name: text(columns.album_name),
                playlist_name: text(columns.playlist),
                added_at,
                duration_ms: field(columns.duration_ms).and_then(parse_duration),
                popularity: number(columns.popularity),
                features: AudioFeatures {
                    valence: number(columns.valence),
                    energy: number(columns.energy),
                    danceability: number(columns.danceability),
                    acousticness: number(columns.acousticness),
                    instrumentalness: number(columns.instrumentalness),
                    liveness: number(columns.liveness),
                    speechiness: number(columns.speechiness),
                    tempo: number(columns.tempo),
                    sentiment: number(columns.sentiment),
                },
            }
        })
        .collect();

    (records, unparseable_dates)
}

/// Remove duplicate and incomplete records.
///
/// Duplicates share the exact `(track_name, artist_name)` pair; the first
/// occurrence in input order is kept. Incomplete rows (no track or no
/// artist name) are dropped afterwards when `drop_incomplete` is set.
pub fn clean_records(
    records: Vec<ListeningRecord>,
    options: &CleanOptions,
) -> (Vec<ListeningRecord>, CleanReport) {
    let raw_rows = records.len();

    let mut seen: HashSet<(Option<String>, Option<String>)> = HashSet::new();
    let mut deduped: Vec<ListeningRecord> = Vec::with_capacity(records.len());
    for record in records {
        let key = (record.track_name.clone(), record.artist_name.clone());
        if seen.insert(key) {
            deduped.push(record);
        }
    }

    let duplicates_removed = raw_rows - deduped.len();
    if duplicates_removed > 0 {
        info!("Removed {} duplicate rows", duplicates_removed);
    }

    let before = deduped.len();
    if options.drop_incomplete {
        deduped.retain(|r| r.track_name.is_some() && r.artist_name.is_some());
    }

    let incomplete_removed = before - deduped.len();
    if incomplete_removed > 0 {
        info!("Removed {} rows with missing track or artist", incomplete_removed);
    }

    let report = CleanReport {
        raw_rows,
        kept: deduped.len(),
        duplicates_removed,
        incomplete_removed,
        unparseable_dates: 0,
    };

    (deduped, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn simple_columns() -> ColumnMap {
        ColumnMap::from_headers(&row(&[
            "Track Name",
            "Artist Name(s)",
            "Album Name",
            "Added At",
            "Popularity",
            "Valence",
        ]))
    }

    fn record(track: Option<&str>, artist: Option<&str>) -> ListeningRecord {
        ListeningRecord {
            track_name: track.map(String::from),
            artist_name: artist.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_timestamp_layouts() {
        let rfc = parse_timestamp("2024-01-05T10:00:00Z").unwrap();
        assert_eq!((rfc.year(), rfc.month(), rfc.day(), rfc.hour()), (2024, 1, 5, 10));

        let offset = parse_timestamp("2024-01-05T01:00:00+02:00").unwrap();
        assert_eq!((offset.day(), offset.hour()), (4, 23));

        assert!(parse_timestamp("2024-01-05 10:00:00").is_some());
        assert!(parse_timestamp("2024-01-05T10:00:00").is_some());
        assert_eq!(parse_timestamp("2024-01-05").unwrap().hour(), 0);
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("not-a-date").is_none());
        assert!(parse_timestamp("2024-13-45").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_parse_timestamp_out_of_range_years() {
        assert!(parse_timestamp("-262143-01-01").is_none());
        assert!(parse_timestamp("+10000-01-01T00:00:00Z").is_none());
        assert!(parse_timestamp("0000-06-01").is_none());
        assert_eq!(parse_timestamp("0001-01-01").unwrap().year(), 1);
        assert_eq!(parse_timestamp("9999-12-31 23:59:59").unwrap().year(), 9999);

        let rows = vec![row(&["Song", "Band", "", "-262143-01-01", "", ""])];
        let (records, bad_dates) = parse_rows(&rows, &simple_columns());
        assert_eq!(records[0].added_at, None);
        assert_eq!(bad_dates, 1);
    }

    #[test]
    fn test_playlist_column() {
        let columns = ColumnMap::from_headers(&row(&["Track Name", "Artist Name(s)", "Playlist Name"]));
        let rows = vec![row(&["Song", "Band", "Road Trip"]), row(&["Other", "Band", " "])];

        let (records, _) = parse_rows(&rows, &columns);

        assert_eq!(records[0].playlist_name.as_deref(), Some("Road Trip"));
        assert_eq!(records[1].playlist_name, None);
    }

    #[test]
    fn test_extract_track_id() {
        assert_eq!(
            extract_track_id("spotify:track:4uLU6hMCjMI75M1A2tKUQC"),
            "4uLU6hMCjMI75M1A2tKUQC"
        );
        assert_eq!(
            extract_track_id("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC?si=abc"),
            "4uLU6hMCjMI75M1A2tKUQC"
        );
        assert_eq!(extract_track_id("local-123"), "local-123");
    }

    #[test]
    fn test_parse_rows_normalizes_missing_values() {
        let rows = vec![
            row(&["  Song ", "Band", "", "2024-02-01T09:00:00Z", "42", "0"]),
            row(&["Other", "", "LP", "yesterday", "n/a", ""]),
            row(&["Short"]),
        ];

        let (records, bad_dates) = parse_rows(&rows, &simple_columns());

        assert_eq!(records.len(), 3);
        assert_eq!(bad_dates, 1);

        assert_eq!(records[0].track_name.as_deref(), Some("Song"));
        assert_eq!(records[0].album_name, None);
        assert!(records[0].added_at.is_some());
        assert_eq!(records[0].popularity, Some(42.0));
        // a real zero stays distinguishable from a missing value
        assert_eq!(records[0].features.valence, Some(0.0));

        assert_eq!(records[1].artist_name, None);
        assert_eq!(records[1].added_at, None);
        assert_eq!(records[1].popularity, None);
        assert_eq!(records[1].features.valence, None);

        assert_eq!(records[2].track_name.as_deref(), Some("Short"));
        assert_eq!(records[2].artist_name, None);
    }

    #[test]
    fn test_duration_parsing() {
        assert_eq!(parse_duration("213573"), Some(213573));
        assert_eq!(parse_duration("213573.4"), Some(213573));
        assert_eq!(parse_duration("-5"), None);
        assert_eq!(parse_duration("abc"), None);
    }

    #[test]
    fn test_duplicates_keep_first_occurrence() {
        let mut first = record(Some("Song"), Some("Band"));
        first.popularity = Some(1.0);
        let mut second = record(Some("Song"), Some("Band"));
        second.popularity = Some(2.0);

        let (records, report) = clean_records(
            vec![first, record(Some("Song"), Some("Other")), second],
            &CleanOptions::default(),
        );

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].popularity, Some(1.0));
        assert_eq!(report.duplicates_removed, 1);
        assert_eq!(report.kept, 2);
    }

    #[test]
    fn test_incomplete_rows() {
        let input = vec![
            record(Some("Song"), Some("Band")),
            record(Some("Song"), None),
            record(None, Some("Band")),
        ];

        let (records, report) = clean_records(input.clone(), &CleanOptions::default());
        assert_eq!(records.len(), 1);
        assert_eq!(report.incomplete_removed, 2);

        let keep = CleanOptions {
            drop_incomplete: false,
        };
        let (records, report) = clean_records(input, &keep);
        assert_eq!(records.len(), 3);
        assert_eq!(report.incomplete_removed, 0);
    }
}
