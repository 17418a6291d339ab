//! Audio-feature summary statistics.
//!
//! Summarizes the optional enrichment fields. A record without a value for
//! a feature is left out of that feature's statistics and nothing else.

use super::aggregator::mean;
use crate::models::{
    Feature, FeatureStats, FeatureSummary, ListeningRecord, SentimentDistribution,
};

const HIGH_MOOD: f64 = 0.7;
const LOW_MOOD: f64 = 0.3;
const POLARITY_CUTOFF: f64 = 0.1;

/// Statistics for one feature, or `None` when no record carries it.
pub fn feature_stats(records: &[ListeningRecord], feature: Feature) -> Option<FeatureStats> {
    let mut values: Vec<f64> = records
        .iter()
        .filter_map(|r| r.features.get(feature))
        .filter(|v| v.is_finite())
        .collect();

    let mean = mean(&values)?;
    values.sort_by(f64::total_cmp);

    let n = values.len();
    let median = if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    };

    let std = if n < 2 {
        None
    } else {
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        Some(variance.sqrt())
    };

    Some(FeatureStats {
        feature,
        samples: n,
        mean,
        std,
        min: values[0],
        max: values[n - 1],
        median,
    })
}

/// Split sentiment values into positive (> 0.1), negative (< -0.1) and neutral.
pub fn sentiment_distribution(records: &[ListeningRecord]) -> Option<SentimentDistribution> {
    let mut dist = SentimentDistribution::default();
    for value in records
        .iter()
        .filter_map(|r| r.features.sentiment)
        .filter(|v| v.is_finite())
    {
        if value > POLARITY_CUTOFF {
            dist.positive += 1;
        } else if value < -POLARITY_CUTOFF {
            dist.negative += 1;
        } else {
            dist.neutral += 1;
        }
    }

    (dist.total() > 0).then_some(dist)
}

/// Summarize every tracked feature and derive mood notes.
pub fn feature_summary(records: &[ListeningRecord]) -> FeatureSummary {
    let mut summary = FeatureSummary {
        stats: Feature::SUMMARIZED
            .iter()
            .filter_map(|&f| feature_stats(records, f))
            .collect(),
        sentiment: sentiment_distribution(records),
        notes: Vec::new(),
    };

    if let Some(valence) = summary.mean_of(Feature::Valence) {
        if valence > HIGH_MOOD {
            summary
                .notes
                .push("High valence: your taste leans upbeat and positive.".to_string());
        } else if valence < LOW_MOOD {
            summary
                .notes
                .push("Low valence: your taste leans introspective or melancholic.".to_string());
        }
    }

    if let Some(energy) = summary.mean_of(Feature::Energy) {
        if energy > HIGH_MOOD {
            summary
                .notes
                .push("High energy: you prefer dynamic, lively tracks.".to_string());
        } else if energy < LOW_MOOD {
            summary
                .notes
                .push("Low energy: you enjoy calm, mellow or acoustic music.".to_string());
        }
    }

    summary
}
