//! Audio-feature enrichment.
//!
//! Attaches Spotify audio features to records after loading. Enrichment is
//! additive only: it fills empty feature slots and never touches the
//! identity fields or values that an export already supplied.

pub mod spotify;

pub use spotify::{SpotifyClient, SpotifyConfig};

use crate::error::EnrichError;
use crate::models::{AudioFeatures, ListeningRecord};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use tracing::{debug, info, warn};

/// Largest batch the audio-features endpoint accepts.
pub const MAX_BATCH_SIZE: usize = 100;

/// Anything that can look up audio features for a batch of track ids.
pub trait FeatureSource {
    /// Returns one slot per requested id, in request order. A `None` slot
    /// means the service has no features for that track.
    fn fetch_features(
        &self,
        ids: &[String],
    ) -> impl Future<Output = Result<Vec<Option<AudioFeatures>>, EnrichError>> + Send;
}

/// Options for an enrichment pass.
#[derive(Debug, Clone)]
pub struct EnrichOptions {
    pub batch_size: usize,
    /// Batches in flight at once.
    pub concurrency: usize,
    pub show_progress: bool,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            batch_size: 50,
            concurrency: 2,
            show_progress: true,
        }
    }
}

/// What an enrichment pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichStats {
    /// Records sent to the feature source.
    pub requested: usize,
    /// Records that gained at least one feature.
    pub enriched: usize,
    /// Records without a usable Spotify track id.
    pub skipped_no_id: usize,
    pub failed_batches: usize,
}

/// Spotify track ids are 22 base-62 characters.
pub fn is_spotify_id(id: &str) -> bool {
    id.len() == 22 && id.chars().all(|c| c.is_ascii_alphanumeric())
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} batches")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Fill missing audio features on `records` from `source`.
///
/// Records that already carry every audio feature are not requested.
/// A failed batch is logged and skipped; the remaining batches still apply.
pub async fn enrich_records<S: FeatureSource>(
    records: &mut [ListeningRecord],
    source: &S,
    options: &EnrichOptions,
) -> EnrichStats {
    let mut stats = EnrichStats::default();

    let mut pending: Vec<(usize, String)> = Vec::new();
    for (index, record) in records.iter().enumerate() {
        if record.features.has_audio_features() {
            continue;
        }
        match record.track_id.as_deref().filter(|id| is_spotify_id(id)) {
            Some(id) => pending.push((index, id.to_string())),
            None => stats.skipped_no_id += 1,
        }
    }

    stats.requested = pending.len();
    if pending.is_empty() {
        info!("No records need audio features");
        return stats;
    }

    let batch_size = options.batch_size.clamp(1, MAX_BATCH_SIZE);
    let batches: Vec<Vec<(usize, String)>> =
        pending.chunks(batch_size).map(<[_]>::to_vec).collect();

    info!(
        "Fetching audio features for {} tracks in {} batches",
        pending.len(),
        batches.len()
    );

    let progress = options.show_progress.then(|| progress_bar(batches.len()));
    let progress_ref = progress.as_ref();

    let results: Vec<_> = stream::iter(batches)
        .map(|batch| async move {
            let ids: Vec<String> = batch.iter().map(|(_, id)| id.clone()).collect();
            let result = source.fetch_features(&ids).await;
            if let Some(pb) = progress_ref {
                pb.inc(1);
            }
            (batch, result)
        })
        .buffered(options.concurrency.max(1))
        .collect()
        .await;

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    for (number, (batch, result)) in results.into_iter().enumerate() {
        match result {
            Ok(features) => {
                if features.len() != batch.len() {
                    warn!(
                        "Batch {} returned {} results for {} ids, ignoring extras",
                        number + 1,
                        features.len(),
                        batch.len()
                    );
                }
                for ((index, _), fetched) in batch.iter().zip(features) {
                    let Some(fetched) = fetched else {
                        continue;
                    };
                    if records[*index].features.fill_missing(&fetched) > 0 {
                        stats.enriched += 1;
                    }
                }
            }
            Err(e) => {
                warn!("Error fetching audio features for batch {}: {}", number + 1, e);
                stats.failed_batches += 1;
            }
        }
    }

    debug!("Enrichment stats: {:?}", stats);
    info!("Added audio features for {} tracks", stats.enriched);

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// In-memory source. Ids ending in 'Z' are unknown to it.
    struct StubSource {
        calls: Mutex<Vec<usize>>,
        fail_on_call: Option<usize>,
    }

    impl StubSource {
        fn new(fail_on_call: Option<usize>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_on_call,
            }
        }
    }

    impl FeatureSource for StubSource {
        async fn fetch_features(
            &self,
            ids: &[String],
        ) -> Result<Vec<Option<AudioFeatures>>, EnrichError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(ids.len());
                calls.len()
            };
            if self.fail_on_call == Some(call) {
                return Err(EnrichError::Api {
                    status: 500,
                    body: "boom".to_string(),
                });
            }
            Ok(ids
                .iter()
                .map(|id| {
                    if id.ends_with('Z') {
                        None
                    } else {
                        Some(AudioFeatures {
                            valence: Some(0.5),
                            energy: Some(0.6),
                            ..Default::default()
                        })
                    }
                })
                .collect())
        }
    }

    fn record(id: Option<&str>) -> ListeningRecord {
        ListeningRecord {
            track_id: id.map(String::from),
            track_name: Some("Song".to_string()),
            artist_name: Some("Band".to_string()),
            ..Default::default()
        }
    }

    fn id(n: usize) -> String {
        format!("{:0>22}", n)
    }

    fn quiet(batch_size: usize) -> EnrichOptions {
        EnrichOptions {
            batch_size,
            concurrency: 2,
            show_progress: false,
        }
    }

    #[test]
    fn test_is_spotify_id() {
        assert!(is_spotify_id("4uLU6hMCjMI75M1A2tKUQC"));
        assert!(!is_spotify_id("spotify:track:4uLU6hMCjMI75M1A2tKUQC"));
        assert!(!is_spotify_id("short"));
    }

    #[test]
    fn test_enrichment_is_additive() {
        let mut records = vec![record(Some(&id(1))), record(None), record(Some("local-file"))];
        records[0].features.valence = Some(0.0);
        let before = records.clone();

        let source = StubSource::new(None);
        let stats = tokio_test::block_on(enrich_records(&mut records, &source, &quiet(50)));

        assert_eq!(stats.requested, 1);
        assert_eq!(stats.enriched, 1);
        assert_eq!(stats.skipped_no_id, 2);

        // existing zero kept, empty slot filled, identity untouched
        assert_eq!(records[0].features.valence, Some(0.0));
        assert_eq!(records[0].features.energy, Some(0.6));
        assert_eq!(records[0].track_name, before[0].track_name);
        assert_eq!(records[0].artist_name, before[0].artist_name);
        assert_eq!(records[1], before[1]);
    }

    #[test]
    fn test_batches_preserve_order_and_skip_failures() {
        let mut records: Vec<_> = (0..5).map(|n| record(Some(&id(n)))).collect();
        let mut missing = id(9);
        missing.replace_range(21..22, "Z");
        records.push(record(Some(&missing)));

        let source = StubSource::new(Some(2));
        let stats = tokio_test::block_on(enrich_records(&mut records, &source, &quiet(2)));

        assert_eq!(stats.requested, 6);
        assert_eq!(stats.failed_batches, 1);
        assert_eq!(source.calls.lock().unwrap().len(), 3);
        // One of the three batches failed; the unknown track stays empty
        assert!(records[5].features.is_empty());
        assert_eq!(stats.enriched, 3);
    }

    #[test]
    fn test_fully_enriched_records_are_not_requested() {
        let mut full = record(Some(&id(1)));
        full.features = AudioFeatures {
            valence: Some(0.1),
            energy: Some(0.1),
            danceability: Some(0.1),
            acousticness: Some(0.1),
            instrumentalness: Some(0.1),
            liveness: Some(0.1),
            speechiness: Some(0.1),
            tempo: Some(120.0),
            sentiment: None,
        };
        let mut records = vec![full];

        let source = StubSource::new(None);
        let stats = tokio_test::block_on(enrich_records(&mut records, &source, &quiet(50)));

        assert_eq!(stats, EnrichStats::default());
        assert!(source.calls.lock().unwrap().is_empty());
    }
}
