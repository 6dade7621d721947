//! Cross-zone normalization and scoring.
//!
//! Each weekly window is normalized independently: within one window the
//! pickup volume, mean driver pay, and mean tip of every zone are min-max
//! rescaled to [0,1] and blended into a single weighted score.

use std::collections::BTreeMap;

use crate::config::ScoreWeights;
use crate::pipeline::rating::{min_max_normalize, score_to_color_hex, score_to_rating};
use crate::pipeline::types::{ScoredWindow, WindowKey, WindowMetric};

/// Scores every metric row against the other zones sharing its window.
///
/// Windows are independent of each other; rows come back grouped by window
/// in chronological order, zones in input order within each window.
pub fn score_windows(metrics: Vec<WindowMetric>, weights: ScoreWeights) -> Vec<ScoredWindow> {
    let mut by_window: BTreeMap<WindowKey, Vec<WindowMetric>> = BTreeMap::new();
    for metric in metrics {
        by_window.entry(metric.window).or_default().push(metric);
    }

    let mut scored = Vec::new();
    for (_, group) in by_window {
        let vols: Vec<Option<f64>> = group.iter().map(|m| Some(m.pickups as f64)).collect();
        let pays: Vec<Option<f64>> = group.iter().map(|m| m.avg_driver_pay).collect();
        let tips: Vec<Option<f64>> = group.iter().map(|m| m.avg_tips).collect();

        let vol_n = min_max_normalize(&vols);
        let pay_n = min_max_normalize(&pays);
        let tip_n = min_max_normalize(&tips);

        for (i, metric) in group.into_iter().enumerate() {
            let score01 =
                weights.volume * vol_n[i] + weights.pay * pay_n[i] + weights.tip * tip_n[i];
            scored.push(ScoredWindow {
                rating: score_to_rating(score01),
                color: score_to_color_hex(score01),
                vol_n: vol_n[i],
                pay_n: pay_n[i],
                tip_n: tip_n[i],
                score01,
                metric,
            });
        }
    }

    scored
}
