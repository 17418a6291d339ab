//! Data models for the listening analyzer.
//!
//! This module contains the core data structures used throughout
//! the application: cleaned listening records, the results derived from
//! them, and the report handed to the generators.

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which name field a record is grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Artist,
    Track,
    Album,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Artist => write!(f, "Artist"),
            EntityKind::Track => write!(f, "Track"),
            EntityKind::Album => write!(f, "Album"),
        }
    }
}

impl EntityKind {
    /// Plural heading used in reports.
    pub fn plural(&self) -> &'static str {
        match self {
            EntityKind::Artist => "Artists",
            EntityKind::Track => "Tracks",
            EntityKind::Album => "Albums",
        }
    }
}

/// Calendar bucket size for temporal grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
    #[default]
    Month,
    Year,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Day => write!(f, "day"),
            Granularity::Week => write!(f, "week"),
            Granularity::Month => write!(f, "month"),
            Granularity::Year => write!(f, "year"),
        }
    }
}

impl Granularity {
    /// First calendar day of the bucket containing `date`.
    ///
    /// Weeks start on Monday, matching ISO week numbering. Returns `None`
    /// when the bucket would start before the earliest representable date.
    pub fn bucket_start(&self, date: NaiveDate) -> Option<NaiveDate> {
        match self {
            Granularity::Day => Some(date),
            Granularity::Week => date.checked_sub_days(Days::new(u64::from(
                date.weekday().num_days_from_monday(),
            ))),
            Granularity::Month => date.with_day(1),
            Granularity::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1),
        }
    }

    /// Label for a bucket starting at `start`.
    pub fn label(&self, start: NaiveDate) -> String {
        match self {
            Granularity::Day => start.format("%Y-%m-%d").to_string(),
            Granularity::Week => {
                let week = start.iso_week();
                format!("{}-W{:02}", week.year(), week.week())
            }
            Granularity::Month => start.format("%Y-%m").to_string(),
            Granularity::Year => start.format("%Y").to_string(),
        }
    }
}

/// Optional audio-feature and sentiment fields attached by enrichment.
///
/// A field that was never populated is `None`; `Some(0.0)` is a real value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub valence: Option<f64>,
    pub energy: Option<f64>,
    pub danceability: Option<f64>,
    pub acousticness: Option<f64>,
    pub instrumentalness: Option<f64>,
    pub liveness: Option<f64>,
    pub speechiness: Option<f64>,
    pub tempo: Option<f64>,
    pub sentiment: Option<f64>,
}

impl AudioFeatures {
    /// True when no field has been populated.
    pub fn is_empty(&self) -> bool {
        *self == AudioFeatures::default()
    }

    /// True when every Spotify audio feature is present.
    ///
    /// Sentiment is not served by the audio-features endpoint and is ignored.
    pub fn has_audio_features(&self) -> bool {
        [
            self.valence,
            self.energy,
            self.danceability,
            self.acousticness,
            self.instrumentalness,
            self.liveness,
            self.speechiness,
            self.tempo,
        ]
        .iter()
        .all(Option::is_some)
    }

    /// Copy fields from `other` into slots that are still empty.
    ///
    /// Existing values are never overwritten. Returns how many fields were filled.
    pub fn fill_missing(&mut self, other: &AudioFeatures) -> usize {
        let mut filled = 0;
        let pairs = [
            (&mut self.valence, other.valence),
            (&mut self.energy, other.energy),
            (&mut self.danceability, other.danceability),
            (&mut self.acousticness, other.acousticness),
            (&mut self.instrumentalness, other.instrumentalness),
            (&mut self.liveness, other.liveness),
            (&mut self.speechiness, other.speechiness),
            (&mut self.tempo, other.tempo),
            (&mut self.sentiment, other.sentiment),
        ];
        for (slot, value) in pairs {
            if slot.is_none() && value.is_some() {
                *slot = value;
                filled += 1;
            }
        }
        filled
    }

    /// Value of a single summarized feature.
    pub fn get(&self, feature: Feature) -> Option<f64> {
        match feature {
            Feature::Valence => self.valence,
            Feature::Energy => self.energy,
            Feature::Danceability => self.danceability,
            Feature::Acousticness => self.acousticness,
            Feature::Sentiment => self.sentiment,
        }
    }
}

/// Features that get summary statistics in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    Valence,
    Energy,
    Danceability,
    Acousticness,
    Sentiment,
}

impl Feature {
    pub const SUMMARIZED: [Feature; 5] = [
        Feature::Valence,
        Feature::Energy,
        Feature::Danceability,
        Feature::Acousticness,
        Feature::Sentiment,
    ];
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feature::Valence => write!(f, "Valence"),
            Feature::Energy => write!(f, "Energy"),
            Feature::Danceability => write!(f, "Danceability"),
            Feature::Acousticness => write!(f, "Acousticness"),
            Feature::Sentiment => write!(f, "Sentiment"),
        }
    }
}

/// One cleaned row of a playlist export.
///
/// Identity is the `(track_name, artist_name)` pair; the cleaner keeps only
/// the first row for each pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListeningRecord {
    /// Spotify track id (the last segment of a track URI).
    pub track_id: Option<String>,
    pub track_name: Option<String>,
    pub artist_name: Option<String>,
    pub album_name: Option<String>,
    /// Playlist the row came from; the export file name when the export has no playlist column.
    pub playlist_name: Option<String>,
    /// When the track was added to the source playlist.
    pub added_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub popularity: Option<f64>,
    /// Enrichment fields; empty unless an export or the API supplied them.
    #[serde(default)]
    pub features: AudioFeatures,
}

impl ListeningRecord {
    /// Name used when grouping by `kind`.
    pub fn name_for(&self, kind: EntityKind) -> Option<&str> {
        match kind {
            EntityKind::Artist => self.artist_name.as_deref(),
            EntityKind::Track => self.track_name.as_deref(),
            EntityKind::Album => self.album_name.as_deref(),
        }
    }

    /// Calendar date the track was added, if known.
    pub fn added_date(&self) -> Option<NaiveDate> {
        self.added_at.map(|ts| ts.date_naive())
    }
}

/// Whether intensity cutoffs compare against raw counts or percentage share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BandBasis {
    Count,
    #[default]
    Share,
}

/// A single intensity label and its inclusive lower bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntensityBand {
    pub label: String,
    pub min: f64,
}

impl IntensityBand {
    pub fn new(label: &str, min: f64) -> Self {
        Self {
            label: label.to_string(),
            min,
        }
    }
}

/// Caller-supplied banding table used to label obsessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntensityBands {
    #[serde(default)]
    pub basis: BandBasis,
    #[serde(default)]
    pub bands: Vec<IntensityBand>,
}

impl Default for IntensityBands {
    fn default() -> Self {
        Self {
            basis: BandBasis::Share,
            bands: vec![
                IntensityBand::new("Extreme", 10.0),
                IntensityBand::new("High", 5.0),
                IntensityBand::new("Moderate", 2.0),
                IntensityBand::new("Low", 0.0),
            ],
        }
    }
}

impl IntensityBands {
    /// Label for an entry with `count` occurrences and `share` of the corpus (0..=1).
    ///
    /// The band with the highest `min` that the value reaches wins. Values
    /// below every band fall into the lowest band. Band order in the table
    /// does not matter. Returns `None` only for an empty table.
    pub fn classify(&self, count: usize, share: f64) -> Option<String> {
        let value = match self.basis {
            BandBasis::Count => count as f64,
            BandBasis::Share => share * 100.0,
        };

        let by_min = |a: &&IntensityBand, b: &&IntensityBand| {
            a.min
                .partial_cmp(&b.min)
                .unwrap_or(std::cmp::Ordering::Equal)
        };

        self.bands
            .iter()
            .filter(|band| value >= band.min)
            .max_by(by_min)
            .or_else(|| self.bands.iter().min_by(by_min))
            .map(|band| band.label.clone())
    }
}

/// An entity whose occurrence count met the obsession threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObsessionEntry {
    pub name: String,
    pub kind: EntityKind,
    pub count: usize,
    /// `count / total_records`, in `0.0..=1.0`.
    pub share: f64,
    /// `share * 100`.
    pub percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intensity: Option<String>,
    /// Input index of the entity's first record.
    pub first_index: usize,
}

/// Obsessions for one entity kind at one threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObsessionGroup {
    pub kind: EntityKind,
    pub threshold: usize,
    pub entries: Vec<ObsessionEntry>,
}

/// Occurrence counts for the most frequent entities of one kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopList {
    pub kind: EntityKind,
    pub entries: Vec<EntityCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCount {
    pub name: String,
    pub count: usize,
}

/// Earliest and latest `added_at` values in a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateSpan {
    pub earliest: DateTime<Utc>,
    pub latest: DateTime<Utc>,
    pub span_days: i64,
}

/// Descriptive statistics over a record collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total_records: usize,
    pub unique_artists: usize,
    /// Distinct track names.
    pub unique_tracks: usize,
    pub unique_albums: usize,
    pub date_span: Option<DateSpan>,
    pub mean_popularity: Option<f64>,
    pub most_common_artist: Option<String>,
    pub most_common_album: Option<String>,
}

/// One calendar bucket of a temporal histogram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub label: String,
    pub start: NaiveDate,
    pub count: usize,
}

/// Records per calendar bucket, in chronological order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalHistogram {
    pub granularity: Granularity,
    pub buckets: Vec<Bucket>,
    /// Highest-count bucket; the earliest one wins a tie.
    pub peak: Option<Bucket>,
    /// Records left out because they have no usable `added_at`.
    pub excluded: usize,
    pub average_per_bucket: Option<f64>,
}

impl TemporalHistogram {
    /// Bucket counts keyed by label, in chronological order.
    pub fn counts(&self) -> Vec<(&str, usize)> {
        self.buckets
            .iter()
            .map(|b| (b.label.as_str(), b.count))
            .collect()
    }
}

/// Records added on each day of the week, Monday first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekdayDistribution {
    pub counts: Vec<(Weekday, usize)>,
    pub peak: Option<Weekday>,
}

/// Records added in each hour of the day (UTC), midnight first.
///
/// Date-only timestamps parse as midnight and land in hour 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyDistribution {
    pub counts: Vec<(u32, usize)>,
    /// Busiest hour; the earliest one wins a tie.
    pub peak: Option<u32>,
}

/// Spread of the collection across artists and albums.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiversityMetrics {
    pub unique_artists: usize,
    /// Simpson's diversity index (`1 - Σ c(c-1) / n(n-1)`).
    pub simpson_index: Option<f64>,
    pub most_common_artist_share: Option<f64>,
    pub top_10_artist_share: Option<f64>,
    pub unique_albums: usize,
    pub single_track_albums: usize,
}

/// Artists first seen in a given year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryYear {
    pub year: i32,
    pub artists: Vec<String>,
}

/// When each artist first showed up in the collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryTimeline {
    pub years: Vec<DiscoveryYear>,
}

impl DiscoveryTimeline {
    pub fn artists_per_year(&self) -> Vec<(i32, usize)> {
        self.years.iter().map(|y| (y.year, y.artists.len())).collect()
    }

    pub fn total_artists(&self) -> usize {
        self.years.iter().map(|y| y.artists.len()).sum()
    }
}

/// Descriptive statistics for one audio feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureStats {
    pub feature: Feature,
    pub samples: usize,
    pub mean: f64,
    /// Sample standard deviation; `None` with fewer than two samples.
    pub std: Option<f64>,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

/// Sentiment values split at +/-0.1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentDistribution {
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
}

impl SentimentDistribution {
    pub fn total(&self) -> usize {
        self.positive + self.negative + self.neutral
    }
}

/// Audio-feature statistics plus mood notes derived from them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSummary {
    pub stats: Vec<FeatureStats>,
    /// `None` when no record carries a sentiment value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<SentimentDistribution>,
    pub notes: Vec<String>,
}

impl FeatureSummary {
    pub fn mean_of(&self, feature: Feature) -> Option<f64> {
        self.stats
            .iter()
            .find(|s| s.feature == feature)
            .map(|s| s.mean)
    }
}

/// Everything the aggregator computes in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternAnalysis {
    pub summary: SummaryStats,
    pub obsessions: Vec<ObsessionGroup>,
    pub top_entities: Vec<TopList>,
    /// Playlists by track count, largest first.
    pub playlists: Vec<EntityCount>,
    pub temporal: TemporalHistogram,
    pub weekdays: WeekdayDistribution,
    pub hours: HourlyDistribution,
    pub diversity: DiversityMetrics,
    pub discovery: DiscoveryTimeline,
    pub features: FeatureSummary,
}

/// Outcome of cleaning one or more raw exports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanReport {
    pub raw_rows: usize,
    pub kept: usize,
    pub duplicates_removed: usize,
    pub incomplete_removed: usize,
    /// Rows whose date column was present but could not be parsed.
    pub unparseable_dates: usize,
}

/// Header comparison against the expected Exportify layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaCheck {
    pub source: String,
    pub is_valid: bool,
    pub missing_columns: Vec<String>,
    pub extra_columns: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Metadata about the analysis report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Files the records were loaded from.
    pub sources: Vec<String>,
    pub generated_at: DateTime<Utc>,
    pub records_analyzed: usize,
    pub threshold: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_n: Option<usize>,
    pub granularity: Granularity,
    /// Records that received audio features from the API.
    pub records_enriched: usize,
    pub duration_seconds: f64,
}

/// The complete listening report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub cleaning: CleanReport,
    pub schema: Vec<SchemaCheck>,
    pub analysis: PatternAnalysis,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_bucket_start_and_label() {
        let d = date(2024, 1, 5); // Friday
        assert_eq!(Granularity::Day.label(Granularity::Day.bucket_start(d).unwrap()), "2024-01-05");
        assert_eq!(Granularity::Week.bucket_start(d), Some(date(2024, 1, 1)));
        assert_eq!(Granularity::Week.label(date(2024, 1, 1)), "2024-W01");
        assert_eq!(Granularity::Month.bucket_start(d), Some(date(2024, 1, 1)));
        assert_eq!(Granularity::Month.label(date(2024, 1, 1)), "2024-01");
        assert_eq!(Granularity::Year.label(Granularity::Year.bucket_start(d).unwrap()), "2024");
    }

    #[test]
    fn test_week_start_before_min_date() {
        // the week containing the earliest date starts before it unless it is a Monday
        assert_eq!(Granularity::Day.bucket_start(NaiveDate::MIN), Some(NaiveDate::MIN));
        if NaiveDate::MIN.weekday() != Weekday::Mon {
            assert_eq!(Granularity::Week.bucket_start(NaiveDate::MIN), None);
        }
    }

    #[test]
    fn test_week_label_across_year_boundary() {
        // 2021-01-01 is a Friday in ISO week 53 of 2020
        let start = Granularity::Week.bucket_start(date(2021, 1, 1)).unwrap();
        assert_eq!(start, date(2020, 12, 28));
        assert_eq!(Granularity::Week.label(start), "2020-W53");
    }

    #[test]
    fn test_default_bands_by_share() {
        let bands = IntensityBands::default();
        assert_eq!(bands.classify(1, 0.15).as_deref(), Some("Extreme"));
        assert_eq!(bands.classify(1, 0.05).as_deref(), Some("High"));
        assert_eq!(bands.classify(1, 0.03).as_deref(), Some("Moderate"));
        assert_eq!(bands.classify(1, 0.001).as_deref(), Some("Low"));
    }

    #[test]
    fn test_count_bands_unordered_table() {
        let bands = IntensityBands {
            basis: BandBasis::Count,
            bands: vec![
                IntensityBand::new("medium", 5.0),
                IntensityBand::new("high", 10.0),
                IntensityBand::new("low", 3.0),
            ],
        };
        assert_eq!(bands.classify(12, 0.0).as_deref(), Some("high"));
        assert_eq!(bands.classify(7, 0.0).as_deref(), Some("medium"));
        assert_eq!(bands.classify(3, 0.0).as_deref(), Some("low"));
        // Below every band falls into the lowest one
        assert_eq!(bands.classify(1, 0.0).as_deref(), Some("low"));
    }

    #[test]
    fn test_empty_band_table() {
        let bands = IntensityBands {
            basis: BandBasis::Count,
            bands: vec![],
        };
        assert_eq!(bands.classify(10, 1.0), None);
    }

    #[test]
    fn test_fill_missing_is_additive() {
        let mut features = AudioFeatures {
            valence: Some(0.0),
            ..Default::default()
        };
        let fetched = AudioFeatures {
            valence: Some(0.9),
            energy: Some(0.4),
            ..Default::default()
        };

        let filled = features.fill_missing(&fetched);

        assert_eq!(filled, 1);
        assert_eq!(features.valence, Some(0.0));
        assert_eq!(features.energy, Some(0.4));
        assert!(!features.is_empty());
        assert!(!features.has_audio_features());
    }

    #[test]
    fn test_name_for_kind() {
        let record = ListeningRecord {
            track_name: Some("Song".to_string()),
            artist_name: Some("Band".to_string()),
            ..Default::default()
        };
        assert_eq!(record.name_for(EntityKind::Track), Some("Song"));
        assert_eq!(record.name_for(EntityKind::Artist), Some("Band"));
        assert_eq!(record.name_for(EntityKind::Album), None);
        assert_eq!(record.added_date(), None);
    }
}
