//! Listening-pattern aggregation.
//!
//! This module computes summary statistics, repeat-obsession rankings and
//! calendar histograms over an in-memory snapshot of cleaned records.
//! Nothing here performs I/O or keeps state between calls; every tunable
//! arrives as an explicit parameter.

use crate::error::AnalysisError;
use crate::models::{
    Bucket, DateSpan, EntityCount, EntityKind, Granularity, HourlyDistribution, IntensityBands,
    ListeningRecord, ObsessionEntry, ObsessionGroup, PatternAnalysis, SummaryStats,
    TemporalHistogram, TopList, WeekdayDistribution,
};
use chrono::{Datelike, NaiveDate, Timelike, Weekday};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Parameters for a full aggregation run.
#[derive(Debug, Clone)]
pub struct AnalysisParams {
    /// Minimum occurrence count for an obsession.
    pub threshold: usize,
    /// Keep at most this many obsessions per kind.
    pub top_n: Option<usize>,
    /// Entity kinds to rank.
    pub kinds: Vec<EntityKind>,
    pub granularity: Granularity,
    pub bands: IntensityBands,
    /// Length of the "most frequent" lists in the report.
    pub top_list_len: usize,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            threshold: 10,
            top_n: None,
            kinds: vec![EntityKind::Artist, EntityKind::Track, EntityKind::Album],
            granularity: Granularity::default(),
            bands: IntensityBands::default(),
            top_list_len: 10,
        }
    }
}

/// A group of records sharing one name.
struct Group<'a> {
    name: &'a str,
    count: usize,
    first_index: usize,
}

/// Group records by the exact name `key` yields, most frequent first.
///
/// Records where `key` gives `None` are skipped. Equal counts keep
/// first-appearance order through the explicit `first_index` key.
fn group_by<'a, F>(records: &'a [ListeningRecord], key: F) -> Vec<Group<'a>>
where
    F: Fn(&'a ListeningRecord) -> Option<&'a str>,
{
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<Group<'a>> = Vec::new();

    for (index, record) in records.iter().enumerate() {
        let Some(name) = key(record) else {
            continue;
        };

        match slots.get(name) {
            Some(&slot) => groups[slot].count += 1,
            None => {
                slots.insert(name, groups.len());
                groups.push(Group {
                    name,
                    count: 1,
                    first_index: index,
                });
            }
        }
    }

    groups.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.first_index.cmp(&b.first_index))
    });

    groups
}

fn group_by_name(records: &[ListeningRecord], kind: EntityKind) -> Vec<Group<'_>> {
    group_by(records, |r| r.name_for(kind))
}

/// Arithmetic mean, or `None` for an empty slice.
pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Occurrence count of every distinct name for `kind`, most frequent first.
pub fn count_entities(records: &[ListeningRecord], kind: EntityKind) -> Vec<EntityCount> {
    group_by_name(records, kind)
        .into_iter()
        .map(|g| EntityCount {
            name: g.name.to_string(),
            count: g.count,
        })
        .collect()
}

/// The `n` most frequent names for `kind`.
pub fn top_entities(records: &[ListeningRecord], kind: EntityKind, n: usize) -> TopList {
    let mut entries = count_entities(records, kind);
    entries.truncate(n);
    TopList { kind, entries }
}

/// The `n` playlists holding the most records.
pub fn top_playlists(records: &[ListeningRecord], n: usize) -> Vec<EntityCount> {
    group_by(records, |r| r.playlist_name.as_deref())
        .into_iter()
        .take(n)
        .map(|g| EntityCount {
            name: g.name.to_string(),
            count: g.count,
        })
        .collect()
}

/// Compute descriptive statistics for a record collection.
///
/// An empty collection yields zero counts and no date span.
pub fn summary_stats(records: &[ListeningRecord]) -> SummaryStats {
    let distinct = |kind: EntityKind| {
        records
            .iter()
            .filter_map(|r| r.name_for(kind))
            .collect::<HashSet<_>>()
            .len()
    };

    let earliest = records.iter().filter_map(|r| r.added_at).min();
    let latest = records.iter().filter_map(|r| r.added_at).max();
    let date_span = match (earliest, latest) {
        (Some(earliest), Some(latest)) => Some(DateSpan {
            earliest,
            latest,
            span_days: (latest - earliest).num_days(),
        }),
        _ => None,
    };

    let popularity: Vec<f64> = records.iter().filter_map(|r| r.popularity).collect();

    let most_common = |kind: EntityKind| {
        group_by_name(records, kind)
            .first()
            .map(|g| g.name.to_string())
    };

    SummaryStats {
        total_records: records.len(),
        unique_artists: distinct(EntityKind::Artist),
        unique_tracks: distinct(EntityKind::Track),
        unique_albums: distinct(EntityKind::Album),
        date_span,
        mean_popularity: mean(&popularity),
        most_common_artist: most_common(EntityKind::Artist),
        most_common_album: most_common(EntityKind::Album),
    }
}

/// Find entities of `kind` that occur at least `threshold` times.
///
/// Each entry's share is measured against the whole collection. Entries are
/// ordered by count, ties by first appearance, then cut to `top_n`. A
/// threshold above every count gives an empty list.
pub fn detect_obsessions(
    records: &[ListeningRecord],
    kind: EntityKind,
    threshold: usize,
    top_n: Option<usize>,
    bands: &IntensityBands,
) -> Vec<ObsessionEntry> {
    let total = records.len();

    let mut entries: Vec<ObsessionEntry> = group_by_name(records, kind)
        .into_iter()
        .filter(|g| g.count >= threshold)
        .map(|g| {
            let share = g.count as f64 / total as f64;
            ObsessionEntry {
                name: g.name.to_string(),
                kind,
                count: g.count,
                share,
                percentage: share * 100.0,
                intensity: bands.classify(g.count, share),
                first_index: g.first_index,
            }
        })
        .collect();

    if let Some(n) = top_n {
        entries.truncate(n);
    }

    entries
}

/// Count records per calendar bucket.
///
/// Records without a usable `added_at` are left out of this histogram only
/// and reported through `excluded`. The peak is the highest bucket; the
/// earliest one wins a tie.
pub fn temporal_buckets(records: &[ListeningRecord], granularity: Granularity) -> TemporalHistogram {
    let mut counts: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    let mut excluded = 0;

    for record in records {
        match record.added_date().and_then(|d| granularity.bucket_start(d)) {
            Some(start) => *counts.entry(start).or_default() += 1,
            None => excluded += 1,
        }
    }

    let buckets: Vec<Bucket> = counts
        .into_iter()
        .map(|(start, count)| Bucket {
            label: granularity.label(start),
            start,
            count,
        })
        .collect();

    let mut peak: Option<&Bucket> = None;
    for bucket in &buckets {
        if peak.map_or(true, |p| bucket.count > p.count) {
            peak = Some(bucket);
        }
    }
    let peak = peak.cloned();

    let dated = records.len() - excluded;
    let average_per_bucket = if buckets.is_empty() {
        None
    } else {
        Some(dated as f64 / buckets.len() as f64)
    };

    TemporalHistogram {
        granularity,
        buckets,
        peak,
        excluded,
        average_per_bucket,
    }
}

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Count dated records per day of the week.
pub fn weekday_distribution(records: &[ListeningRecord]) -> WeekdayDistribution {
    let mut tally = [0usize; 7];
    for date in records.iter().filter_map(|r| r.added_date()) {
        tally[date.weekday().num_days_from_monday() as usize] += 1;
    }

    let counts: Vec<(Weekday, usize)> = WEEK.into_iter().zip(tally).collect();

    let mut peak: Option<(Weekday, usize)> = None;
    for &(day, count) in &counts {
        if count > 0 && peak.map_or(true, |(_, best)| count > best) {
            peak = Some((day, count));
        }
    }

    WeekdayDistribution {
        counts,
        peak: peak.map(|(day, _)| day),
    }
}

/// Count dated records per hour of the day.
pub fn hourly_distribution(records: &[ListeningRecord]) -> HourlyDistribution {
    let mut tally = [0usize; 24];
    for ts in records.iter().filter_map(|r| r.added_at) {
        tally[ts.hour() as usize] += 1;
    }

    let mut peak: Option<(u32, usize)> = None;
    for (hour, &count) in (0u32..).zip(tally.iter()) {
        if count > 0 && peak.map_or(true, |(_, best)| count > best) {
            peak = Some((hour, count));
        }
    }

    HourlyDistribution {
        counts: (0u32..).zip(tally).collect(),
        peak: peak.map(|(hour, _)| hour),
    }
}

/// Run every aggregation over one snapshot.
///
/// The only failure is an absent collection; missing optional fields on
/// individual records just drop out of the calculations that need them.
pub fn analyze(
    records: Option<&[ListeningRecord]>,
    params: &AnalysisParams,
) -> Result<PatternAnalysis, AnalysisError> {
    let records = records.ok_or(AnalysisError::MissingInput)?;

    debug!(
        "Aggregating {} records (threshold {}, granularity {})",
        records.len(),
        params.threshold,
        params.granularity
    );

    let obsessions = params
        .kinds
        .iter()
        .map(|&kind| ObsessionGroup {
            kind,
            threshold: params.threshold,
            entries: detect_obsessions(records, kind, params.threshold, params.top_n, &params.bands),
        })
        .collect();

    let top_entities = params
        .kinds
        .iter()
        .map(|&kind| top_entities(records, kind, params.top_list_len))
        .collect();

    Ok(PatternAnalysis {
        summary: summary_stats(records),
        obsessions,
        top_entities,
        playlists: top_playlists(records, params.top_list_len),
        temporal: temporal_buckets(records, params.granularity),
        weekdays: weekday_distribution(records),
        hours: hourly_distribution(records),
        diversity: super::diversity::diversity_metrics(records),
        discovery: super::evolution::discovery_timeline(records),
        features: super::features::feature_summary(records),
    })
}
