use rayon::prelude::*;

use crate::assemble::{ProfilePlan, assemble_profile};
use crate::config::OptimizeConfig;
use crate::demand::{expand_demands, group_by_profile};
use crate::error::Result;
use crate::packer::{BarBin, upsized_stock_length};
use crate::strategy::{self, MinBarCount, Strategy};
use crate::types::{CuttingPlan, DemandRow, Item, LENGTH_EPSILON, SolveStatus, Warning};

/// Optimizes a cutting plan for `demand` under `config`.
///
/// Profiles are planned independently; the output lists them in the order
/// they first appear in `demand`.
pub fn optimize(demand: &[DemandRow], config: &OptimizeConfig) -> Result<CuttingPlan> {
    Solver::new(config.clone(), demand.to_vec()).solve()
}

pub struct Solver {
    config: OptimizeConfig,
    demands: Vec<DemandRow>,
}

impl Solver {
    pub fn new(config: OptimizeConfig, demands: Vec<DemandRow>) -> Self {
        Self { config, demands }
    }

    pub fn solve(&self) -> Result<CuttingPlan> {
        self.config.validate()?;
        let items = expand_demands(&self.demands)?;
        let groups = group_by_profile(items);

        tracing::info!(
            rows = self.demands.len(),
            profiles = groups.len(),
            objective = %self.config.objective,
            gap = self.config.cutting_gap,
            "optimizing cutting plan"
        );
        let start = std::time::Instant::now();

        let strategy = strategy::for_objective(&self.config);
        let strategy = strategy.as_ref();
        let profiles: Vec<(ProfilePlan, Vec<Warning>)> = if self.config.parallel {
            groups
                .par_iter()
                .map(|(code, items)| self.plan_profile(code, items, strategy))
                .collect::<Result<Vec<_>>>()?
        } else {
            groups
                .iter()
                .map(|(code, items)| self.plan_profile(code, items, strategy))
                .collect::<Result<Vec<_>>>()?
        };

        let mut plan = CuttingPlan::default();
        for (profile, warnings) in profiles {
            plan.results.extend(profile.results);
            plan.patterns.extend(profile.bars);
            plan.summaries.push(profile.summary);
            plan.unassigned.extend(profile.unassigned);
            plan.warnings.extend(warnings);
        }

        tracing::info!(
            bars = plan.bar_count(),
            unassigned = plan.unassigned.len(),
            warnings = plan.warnings.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "cutting plan ready"
        );
        Ok(plan)
    }

    fn plan_profile(
        &self,
        profile_code: &str,
        items: &[Item],
        strategy: &dyn Strategy,
    ) -> Result<(ProfilePlan, Vec<Warning>)> {
        let kerf = self.config.kerf();
        let stock_lengths = &self.config.stock_lengths;
        let max_stock = self.config.max_stock_length().unwrap_or(0.0);

        let mut warnings = Vec::new();
        let mut upsized = Vec::new();
        let mut lengths = Vec::with_capacity(items.len());
        for item in items {
            if kerf.requirement(item.length) <= max_stock + LENGTH_EPSILON {
                lengths.push(item.length);
                continue;
            }
            let synthetic = upsized_stock_length(item.length, kerf, self.config.upsize_step);
            tracing::warn!(
                profile_code,
                item_id = %item.item_id,
                length = item.length,
                synthetic_stock_length = synthetic,
                "piece exceeds every stock length, upsizing"
            );
            let mut bin = BarBin::upsized(synthetic);
            bin.place(item.length, kerf);
            upsized.push(bin);
            warnings.push(Warning::UnfittablePiece {
                profile_code: profile_code.to_string(),
                length: item.length,
                synthetic_stock_length: synthetic,
            });
        }

        let mut outcome = match strategy.pack(profile_code, &lengths, kerf, stock_lengths) {
            Ok(outcome) => outcome,
            Err(err) if err.is_capacity_exceeded() && self.config.exact.fallback_to_heuristic => {
                tracing::warn!(profile_code, error = %err, "falling back to min-bar-count");
                warnings.push(Warning::ExactFallback {
                    profile_code: profile_code.to_string(),
                    reason: err.to_string(),
                });
                let mut outcome = MinBarCount.pack(profile_code, &lengths, kerf, stock_lengths)?;
                outcome.status = SolveStatus::Fallback;
                outcome
            }
            Err(err) => return Err(err),
        };
        if let Some(elapsed_ms) = outcome.elapsed_ms {
            tracing::warn!(profile_code, elapsed_ms, "exact search hit its time limit");
            warnings.push(Warning::ExactTimeLimit {
                profile_code: profile_code.to_string(),
                elapsed_ms,
            });
        }

        tracing::debug!(
            profile_code,
            strategy = strategy.name(),
            pieces = items.len(),
            bars = outcome.bins.len() + upsized.len(),
            "profile packed"
        );

        outcome.bins.extend(upsized);
        let plan = assemble_profile(profile_code, items, outcome.bins, kerf, outcome.status);
        Ok((plan, warnings))
    }
}
