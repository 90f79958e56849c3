use std::collections::{HashMap, VecDeque};

use crate::packer::BarBin;
use crate::types::{Bar, Item, Kerf, ProfileSummary, ResultRow, SolveStatus, UnassignedItem};

/// Everything produced for one profile code.
#[derive(Debug, Clone)]
pub struct ProfilePlan {
    pub results: Vec<ResultRow>,
    pub bars: Vec<Bar>,
    pub summary: ProfileSummary,
    pub unassigned: Vec<UnassignedItem>,
}

/// Maps packed lengths back onto concrete items and computes the profile summary.
///
/// Each placed length consumes the first unconsumed item of exactly that
/// length, so which of several identical items lands on which bar is
/// deterministic but otherwise arbitrary.
pub fn assemble_profile(
    profile_code: &str,
    items: &[Item],
    bins: Vec<BarBin>,
    kerf: Kerf,
    status: SolveStatus,
) -> ProfilePlan {
    let mut pool: HashMap<u64, VecDeque<usize>> = HashMap::new();
    for (idx, item) in items.iter().enumerate() {
        pool.entry(item.length.to_bits()).or_default().push_back(idx);
    }
    let mut consumed = vec![false; items.len()];

    let mut results = Vec::with_capacity(items.len());
    let mut bars: Vec<Bar> = Vec::with_capacity(bins.len());
    for bin in bins {
        let bar_number = bars.len() as u32 + 1;
        let mut bar_items = Vec::with_capacity(bin.lengths.len());
        for length in &bin.lengths {
            let Some(idx) = pool
                .get_mut(&length.to_bits())
                .and_then(|queue| queue.pop_front())
            else {
                tracing::warn!(profile_code, length, "placed length has no matching item");
                continue;
            };
            consumed[idx] = true;
            let item = items[idx].clone();
            results.push(ResultRow {
                profile_code: profile_code.to_string(),
                item_id: item.item_id.clone(),
                length: item.length,
                bar_number,
                door_code: item.door_code.clone(),
            });
            bar_items.push(item);
        }
        if bar_items.is_empty() {
            continue;
        }

        let used_length: f64 = bar_items.iter().map(|i| i.length).sum();
        let remaining_length = bin.stock_length - used_length - kerf.gaps(bar_items.len());
        bars.push(Bar {
            profile_code: profile_code.to_string(),
            bar_number,
            stock_length: bin.stock_length,
            efficiency: used_length / bin.stock_length,
            used_length,
            remaining_length,
            items: bar_items,
            upsized: bin.upsized,
        });
    }

    let unassigned: Vec<UnassignedItem> = items
        .iter()
        .zip(&consumed)
        .filter(|(_, used)| !**used)
        .map(|(item, _)| UnassignedItem {
            item: item.clone(),
            note: format!("left over for profile {profile_code}"),
        })
        .collect();

    let summary = summarize(profile_code, items.len(), &bars, kerf, status);
    ProfilePlan {
        results,
        bars,
        summary,
        unassigned,
    }
}

fn summarize(
    profile_code: &str,
    total_pieces: usize,
    bars: &[Bar],
    kerf: Kerf,
    status: SolveStatus,
) -> ProfileSummary {
    let total_length_needed: f64 = bars.iter().map(|b| b.used_length).sum();
    let total_stock_length: f64 = bars.iter().map(|b| b.stock_length).sum();
    let gaps: f64 = bars.iter().map(|b| kerf.gaps(b.piece_count())).sum();
    let overall_efficiency = if total_stock_length > 0.0 {
        total_length_needed / total_stock_length
    } else {
        0.0
    };
    let average_bar_efficiency = if bars.is_empty() {
        0.0
    } else {
        bars.iter().map(|b| b.efficiency).sum::<f64>() / bars.len() as f64
    };

    ProfileSummary {
        profile_code: profile_code.to_string(),
        total_pieces,
        total_bars_used: bars.len(),
        total_length_needed,
        total_stock_length,
        waste: total_stock_length - total_length_needed - gaps,
        overall_efficiency,
        average_bar_efficiency,
        upsized_bars: bars.iter().filter(|b| b.upsized).count(),
        solve_status: status,
    }
}
