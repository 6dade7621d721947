//! Zone selection: the fixed overall GOOD/BAD sets, the per-window
//! top/bottom filter that bounds polygon output, and the per-zone overall
//! statistics carried by persistent markers.

use std::collections::BTreeMap;
use tracing::debug;

use crate::pipeline::rating::{score_to_color_hex, score_to_rating};
use crate::pipeline::types::{
    OverallZoneStats, ScoredWindow, SelectionSet, WindowKey, ZoneTotal,
};

/// Picks the overall GOOD set (highest lifetime pickups) and BAD set
/// (lowest lifetime pickups among the rest). The sets are disjoint by
/// construction; ties resolve to the lower zone id since `totals` arrives
/// sorted by zone.
pub fn select_overall(totals: &[ZoneTotal], good_n: usize, bad_n: usize) -> SelectionSet {
    let mut by_volume: Vec<&ZoneTotal> = totals.iter().collect();
    by_volume.sort_by(|a, b| b.pickups.cmp(&a.pickups));

    let mut selection = SelectionSet::default();
    for total in by_volume.iter().take(good_n) {
        selection.good.insert(total.zone);
    }

    let mut pool: Vec<&&ZoneTotal> = by_volume
        .iter()
        .filter(|t| !selection.good.contains(&t.zone))
        .collect();
    pool.sort_by(|a, b| a.pickups.cmp(&b.pickups));
    for total in pool.into_iter().take(bad_n) {
        selection.bad.insert(total.zone);
    }

    debug!(
        good = selection.good.len(),
        bad = selection.bad.len(),
        "Overall zone selection complete"
    );
    selection
}

/// Restricts scored rows to shown zones.
pub fn restrict_to_shown(scored: Vec<ScoredWindow>, selection: &SelectionSet) -> Vec<ScoredWindow> {
    scored
        .into_iter()
        .filter(|s| selection.contains(s.metric.zone))
        .collect()
}

/// Keeps, per window, only the rows whose descending score rank is within
/// `win_good_n` or whose ascending rank is within `win_bad_n`. Ties resolve
/// in first-seen order. Windows with fewer rows than the cutoffs keep
/// everything.
pub fn select_window_top_bottom(
    scored: Vec<ScoredWindow>,
    win_good_n: usize,
    win_bad_n: usize,
) -> Vec<ScoredWindow> {
    let mut by_window: BTreeMap<WindowKey, Vec<ScoredWindow>> = BTreeMap::new();
    for row in scored {
        by_window.entry(row.metric.window).or_default().push(row);
    }

    let mut kept = Vec::new();
    for (_, group) in by_window {
        let mut order: Vec<usize> = (0..group.len()).collect();
        // stable sorts, so equal scores keep their first-seen order
        order.sort_by(|&a, &b| group[b].score01.total_cmp(&group[a].score01));
        let mut rank_good = vec![0usize; group.len()];
        for (pos, &idx) in order.iter().enumerate() {
            rank_good[idx] = pos + 1;
        }

        order.sort_by(|&a, &b| group[a].score01.total_cmp(&group[b].score01));
        let mut rank_bad = vec![0usize; group.len()];
        for (pos, &idx) in order.iter().enumerate() {
            rank_bad[idx] = pos + 1;
        }

        for (idx, row) in group.into_iter().enumerate() {
            if rank_good[idx] <= win_good_n || rank_bad[idx] <= win_bad_n {
                kept.push(row);
            }
        }
    }

    kept
}

/// Collapses every scored window of each zone into the overall statistics
/// shown in marker popups: mean score across the zone's windows, summed
/// pickups, and means of the window pay/tip means.
pub fn overall_zone_stats(scored: &[ScoredWindow]) -> BTreeMap<u32, OverallZoneStats> {
    #[derive(Default)]
    struct Acc {
        score_sum: f64,
        windows: u64,
        pickups: u64,
        pay_sum: f64,
        pay_n: u64,
        tip_sum: f64,
        tip_n: u64,
    }

    let mut by_zone: BTreeMap<u32, Acc> = BTreeMap::new();
    for row in scored {
        let acc = by_zone.entry(row.metric.zone).or_default();
        acc.score_sum += row.score01;
        acc.windows += 1;
        acc.pickups += row.metric.pickups;
        if let Some(pay) = row.metric.avg_driver_pay {
            acc.pay_sum += pay;
            acc.pay_n += 1;
        }
        if let Some(tip) = row.metric.avg_tips {
            acc.tip_sum += tip;
            acc.tip_n += 1;
        }
    }

    by_zone
        .into_iter()
        .map(|(zone, acc)| {
            let score01_mean = acc.score_sum / acc.windows as f64;
            (
                zone,
                OverallZoneStats {
                    zone,
                    score01_mean,
                    pickups_sum: acc.pickups,
                    avg_driver_pay: (acc.pay_n > 0).then(|| acc.pay_sum / acc.pay_n as f64),
                    avg_tips: (acc.tip_n > 0).then(|| acc.tip_sum / acc.tip_n as f64),
                    rating: score_to_rating(score01_mean),
                    color: score_to_color_hex(score01_mean),
                },
            )
        })
        .collect()
}
