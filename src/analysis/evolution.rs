//! Artist discovery over time.

use crate::models::{DiscoveryTimeline, DiscoveryYear, ListeningRecord};
use chrono::{DateTime, Datelike, Utc};
use std::collections::{BTreeMap, HashMap};

/// Group artists by the year of their first dated appearance.
///
/// Undated records are ignored. Within a year, artists are listed in the
/// order of their first record in the input.
pub fn discovery_timeline(records: &[ListeningRecord]) -> DiscoveryTimeline {
    // artist -> (first seen, input index of that record)
    let mut first_seen: HashMap<&str, (DateTime<Utc>, usize)> = HashMap::new();

    for (index, record) in records.iter().enumerate() {
        let (Some(artist), Some(added_at)) = (record.artist_name.as_deref(), record.added_at)
        else {
            continue;
        };

        first_seen
            .entry(artist)
            .and_modify(|seen| {
                if added_at < seen.0 {
                    seen.0 = added_at;
                }
            })
            .or_insert((added_at, index));
    }

    let mut ordered: Vec<(&str, DateTime<Utc>, usize)> = first_seen
        .into_iter()
        .map(|(artist, (at, index))| (artist, at, index))
        .collect();
    ordered.sort_by_key(|&(_, _, index)| index);

    let mut by_year: BTreeMap<i32, Vec<String>> = BTreeMap::new();
    for (artist, at, _) in ordered {
        by_year.entry(at.year()).or_default().push(artist.to_string());
    }

    DiscoveryTimeline {
        years: by_year
            .into_iter()
            .map(|(year, artists)| DiscoveryYear { year, artists })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(artist: &str, year: Option<i32>) -> ListeningRecord {
        ListeningRecord {
            track_name: Some("song".to_string()),
            artist_name: Some(artist.to_string()),
            added_at: year.map(|y| Utc.with_ymd_and_hms(y, 6, 1, 0, 0, 0).unwrap()),
            ..Default::default()
        }
    }

    #[test]
    fn test_discovery_by_year() {
        let records = vec![
            record("B", Some(2022)),
            record("A", Some(2021)),
            record("B", Some(2020)),
            record("C", Some(2022)),
            record("D", None),
        ];

        let timeline = discovery_timeline(&records);

        assert_eq!(timeline.artists_per_year(), vec![(2020, 1), (2021, 1), (2022, 1)]);
        assert_eq!(timeline.years[0].artists, vec!["B"]);
        assert_eq!(timeline.years[2].artists, vec!["C"]);
        assert_eq!(timeline.total_artists(), 3);
    }

    #[test]
    fn test_same_year_keeps_input_order() {
        let records = vec![
            record("Zed", Some(2023)),
            record("Abba", Some(2023)),
            record("Moby", Some(2023)),
        ];

        let timeline = discovery_timeline(&records);
        assert_eq!(timeline.years.len(), 1);
        assert_eq!(timeline.years[0].artists, vec!["Zed", "Abba", "Moby"]);
    }

    #[test]
    fn test_no_dates() {
        let timeline = discovery_timeline(&[record("A", None)]);
        assert!(timeline.years.is_empty());
    }
}
