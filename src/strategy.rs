//! Packing strategies: one per optimization objective.

use crate::config::OptimizeConfig;
use crate::error::{Error, Result};
use crate::exact::ExactSolver;
use crate::packer::{BarBin, Packing, first_fit_decreasing, sorted_descending};
use crate::types::{Kerf, LENGTH_EPSILON, Objective, SolveStatus};

/// Bars chosen for one profile plus how they were obtained.
#[derive(Debug, Clone, Default)]
pub struct PackOutcome {
    pub bins: Vec<BarBin>,
    pub status: SolveStatus,
    /// Set when the search stopped on its time budget.
    pub elapsed_ms: Option<u64>,
}

impl PackOutcome {
    pub fn heuristic(bins: Vec<BarBin>) -> Self {
        Self {
            bins,
            status: SolveStatus::Heuristic,
            elapsed_ms: None,
        }
    }
}

pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Packs every length onto bars drawn from `stock_lengths`.
    ///
    /// Callers upsize pieces longer than every stock length beforehand, so
    /// each length fits at least the longest candidate.
    fn pack(
        &self,
        profile_code: &str,
        lengths: &[f64],
        kerf: Kerf,
        stock_lengths: &[f64],
    ) -> Result<PackOutcome>;
}

/// Builds the strategy for the configured objective.
pub fn for_objective(config: &OptimizeConfig) -> Box<dyn Strategy> {
    match config.objective {
        Objective::MaxEfficiency => Box::new(MaxEfficiency),
        Objective::MinBarCount => Box::new(MinBarCount),
        Objective::FlexibleMultiLength => Box::new(FlexibleMultiLength),
        Objective::Exact => Box::new(ExactSolver::new(config.exact.clone())),
    }
}

/// Stock lengths able to hold the longest piece, in configured order.
pub(crate) fn feasible_stock_lengths(
    lengths: &[f64],
    kerf: Kerf,
    stock_lengths: &[f64],
) -> Result<Vec<f64>> {
    if stock_lengths.is_empty() {
        return Err(Error::Configuration(
            "at least one stock length is required".to_string(),
        ));
    }
    let longest = lengths.iter().copied().fold(0.0, f64::max);
    let need = kerf.requirement(longest);
    Ok(stock_lengths
        .iter()
        .copied()
        .filter(|&l| need <= l + LENGTH_EPSILON)
        .collect())
}

/// Distinct stock lengths, shortest first.
pub(crate) fn ascending_stock_lengths(stock_lengths: &[f64]) -> Result<Vec<f64>> {
    if stock_lengths.is_empty() {
        return Err(Error::Configuration(
            "at least one stock length is required".to_string(),
        ));
    }
    let mut sorted = stock_lengths.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted.dedup();
    Ok(sorted)
}

/// Runs first-fit-decreasing once per candidate stock length.
fn candidate_packings(
    profile_code: &str,
    lengths: &[f64],
    kerf: Kerf,
    stock_lengths: &[f64],
) -> Result<Vec<(f64, Packing)>> {
    let candidates = feasible_stock_lengths(lengths, kerf, stock_lengths)?;
    Ok(candidates
        .into_iter()
        .map(|stock| {
            let packing = first_fit_decreasing(lengths, stock, kerf);
            tracing::debug!(
                profile_code,
                stock_length = stock,
                bars = packing.bar_count(),
                efficiency = packing.efficiency(),
                "candidate packed"
            );
            (stock, packing)
        })
        .collect())
}

/// Keeps the single stock length whose packing has the highest efficiency.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxEfficiency;

impl Strategy for MaxEfficiency {
    fn name(&self) -> &'static str {
        "max-efficiency"
    }

    fn pack(
        &self,
        profile_code: &str,
        lengths: &[f64],
        kerf: Kerf,
        stock_lengths: &[f64],
    ) -> Result<PackOutcome> {
        let mut best: Option<Packing> = None;
        for (_, packing) in candidate_packings(profile_code, lengths, kerf, stock_lengths)? {
            let better = match &best {
                None => true,
                Some(b) => packing.efficiency() > b.efficiency(),
            };
            if better {
                best = Some(packing);
            }
        }
        Ok(PackOutcome::heuristic(
            best.map(|p| p.bins).unwrap_or_default(),
        ))
    }
}

/// Keeps the single stock length needing the fewest bars, then the most efficient.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinBarCount;

impl Strategy for MinBarCount {
    fn name(&self) -> &'static str {
        "min-bar-count"
    }

    fn pack(
        &self,
        profile_code: &str,
        lengths: &[f64],
        kerf: Kerf,
        stock_lengths: &[f64],
    ) -> Result<PackOutcome> {
        let mut best: Option<Packing> = None;
        for (_, packing) in candidate_packings(profile_code, lengths, kerf, stock_lengths)? {
            let better = match &best {
                None => true,
                Some(b) => {
                    packing.bar_count() < b.bar_count()
                        || (packing.bar_count() == b.bar_count()
                            && packing.efficiency() > b.efficiency())
                }
            };
            if better {
                best = Some(packing);
            }
        }
        Ok(PackOutcome::heuristic(
            best.map(|p| p.bins).unwrap_or_default(),
        ))
    }
}

/// Mixes stock lengths within a profile: best fit into any open bar, otherwise
/// the shortest stock length that holds the piece.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlexibleMultiLength;

impl Strategy for FlexibleMultiLength {
    fn name(&self) -> &'static str {
        "flexible"
    }

    fn pack(
        &self,
        profile_code: &str,
        lengths: &[f64],
        kerf: Kerf,
        stock_lengths: &[f64],
    ) -> Result<PackOutcome> {
        let candidates = ascending_stock_lengths(stock_lengths)?;

        let mut bins: Vec<BarBin> = Vec::new();
        for length in sorted_descending(lengths) {
            let mut best_bin: Option<(usize, f64)> = None;
            for (bi, bin) in bins.iter().enumerate() {
                if let Some(left) = bin.leftover_after(length, kerf)
                    && best_bin.is_none_or(|(_, best)| left < best)
                {
                    best_bin = Some((bi, left));
                }
            }

            if let Some((bi, _)) = best_bin {
                bins[bi].place(length, kerf);
                continue;
            }

            let need = kerf.requirement(length);
            let Some(&stock) = candidates.iter().find(|&&l| need <= l + LENGTH_EPSILON) else {
                return Err(Error::Configuration(format!(
                    "profile '{profile_code}': no stock length holds a {length} piece"
                )));
            };
            let mut bin = BarBin::new(stock);
            bin.place(length, kerf);
            bins.push(bin);
        }

        tracing::debug!(profile_code, bars = bins.len(), "flexible packing");
        Ok(PackOutcome::heuristic(bins))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GapPolicy;

    fn kerf(gap: f64) -> Kerf {
        Kerf::new(gap, GapPolicy::BetweenPieces)
    }

    #[test]
    fn test_empty_candidates_is_configuration_error() {
        let err = MinBarCount
            .pack("A", &[1000.0], kerf(0.0), &[])
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(MaxEfficiency.pack("A", &[1000.0], kerf(0.0), &[]).is_err());
        assert!(FlexibleMultiLength.pack("A", &[1000.0], kerf(0.0), &[]).is_err());
    }

    #[test]
    fn test_max_efficiency_picks_tighter_stock() {
        // 4 x 1500 fill a 6000 bar exactly; on 6500 they waste 500.
        let lengths = [1500.0; 4];
        let out = MaxEfficiency
            .pack("A", &lengths, kerf(0.0), &[6500.0, 6000.0])
            .unwrap();
        assert_eq!(out.bins.len(), 1);
        assert_eq!(out.bins[0].stock_length, 6000.0);
        assert_eq!(out.status, SolveStatus::Heuristic);
    }

    #[test]
    fn test_max_efficiency_first_seen_wins_ties() {
        // 2 x 3000 on 6000 (1 bar, 100%) vs 2 x 3000 on 3000 (2 bars, 100%).
        let lengths = [3000.0, 3000.0];
        let out = MaxEfficiency
            .pack("A", &lengths, kerf(0.0), &[3000.0, 6000.0])
            .unwrap();
        assert_eq!(out.bins.len(), 2);
        assert_eq!(out.bins[0].stock_length, 3000.0);
    }

    #[test]
    fn test_min_bar_count_prefers_fewer_bars() {
        let lengths = [3000.0, 3000.0];
        let out = MinBarCount
            .pack("A", &lengths, kerf(0.0), &[3000.0, 6000.0])
            .unwrap();
        assert_eq!(out.bins.len(), 1);
        assert_eq!(out.bins[0].stock_length, 6000.0);
    }

    #[test]
    fn test_min_bar_count_breaks_ties_by_efficiency() {
        let lengths = [2000.0, 2000.0];
        let out = MinBarCount
            .pack("A", &lengths, kerf(0.0), &[6500.0, 4000.0])
            .unwrap();
        assert_eq!(out.bins.len(), 1);
        assert_eq!(out.bins[0].stock_length, 4000.0);
    }

    #[test]
    fn test_infeasible_candidates_skipped() {
        // 5000 cannot hold the 5500 piece, so only 6000 is considered.
        let lengths = [5500.0, 400.0];
        let out = MaxEfficiency
            .pack("A", &lengths, kerf(0.0), &[5000.0, 6000.0])
            .unwrap();
        assert!(out.bins.iter().all(|b| b.stock_length == 6000.0));
        assert_eq!(out.bins.len(), 1);
    }

    #[test]
    fn test_flexible_mixes_stock_lengths() {
        let lengths = [5800.0, 2900.0, 2900.0];
        let out = FlexibleMultiLength
            .pack("A", &lengths, kerf(0.0), &[6000.0, 3000.0])
            .unwrap();
        let mut stocks: Vec<f64> = out.bins.iter().map(|b| b.stock_length).collect();
        stocks.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(stocks, vec![3000.0, 3000.0, 6000.0]);
    }

    #[test]
    fn test_flexible_best_fit_into_open_bar() {
        // 4000 -> 6000 bar (2000 left), 2500 -> 3000 bar (500 left),
        // 400 goes where it leaves the least: the 3000 bar.
        let lengths = [4000.0, 2500.0, 400.0];
        let out = FlexibleMultiLength
            .pack("A", &lengths, kerf(0.0), &[6000.0, 3000.0])
            .unwrap();
        assert_eq!(out.bins.len(), 2);
        assert_eq!(out.bins[1].stock_length, 3000.0);
        assert_eq!(out.bins[1].lengths, vec![2500.0, 400.0]);
    }

    #[test]
    fn test_for_objective() {
        let config = OptimizeConfig::new(vec![6000.0]);
        assert_eq!(for_objective(&config).name(), "max-efficiency");
        let config = config.with_objective(Objective::Exact);
        assert_eq!(for_objective(&config).name(), "exact");
    }
}
