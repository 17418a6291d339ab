//! Artist and album diversity metrics.

use super::aggregator::count_entities;
use crate::models::{DiversityMetrics, EntityKind, ListeningRecord};

/// Compute how spread out the collection is across artists and albums.
pub fn diversity_metrics(records: &[ListeningRecord]) -> DiversityMetrics {
    let artists = count_entities(records, EntityKind::Artist);
    let albums = count_entities(records, EntityKind::Album);
    let n = records.len();

    let share = |count: usize| {
        if n == 0 {
            None
        } else {
            Some(count as f64 / n as f64)
        }
    };

    let simpson_index = if n < 2 {
        None
    } else {
        let denominator = (n * (n - 1)) as f64;
        let concentration: f64 = artists
            .iter()
            .map(|a| (a.count * a.count.saturating_sub(1)) as f64 / denominator)
            .sum();
        Some(1.0 - concentration)
    };

    let top_10: usize = artists.iter().take(10).map(|a| a.count).sum();

    DiversityMetrics {
        unique_artists: artists.len(),
        simpson_index,
        most_common_artist_share: artists.first().and_then(|a| share(a.count)),
        top_10_artist_share: if artists.is_empty() { None } else { share(top_10) },
        unique_albums: albums.len(),
        single_track_albums: albums.iter().filter(|a| a.count == 1).count(),
    }
}
