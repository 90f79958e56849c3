//! Run configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{GapPolicy, Kerf, Objective};

/// Limits for the exact (pattern-based) solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExactConfig {
    /// Wall-clock budget for the branch and bound search, in milliseconds.
    pub time_limit_ms: u64,
    /// Maximum number of pieces per profile the solver accepts.
    pub max_items: usize,
    /// Maximum number of patterns enumerated per profile.
    pub max_patterns: usize,
    /// Maximum number of pieces in a single pattern.
    pub max_pieces_per_pattern: usize,
    /// Patterns using less than this share of their bar are discarded (0.0 - 1.0).
    pub min_pattern_efficiency: f64,
    /// Use the min-bar-count heuristic when the limits are exceeded instead of failing.
    pub fallback_to_heuristic: bool,
}

impl Default for ExactConfig {
    fn default() -> Self {
        Self {
            time_limit_ms: 30_000,
            max_items: 400,
            max_patterns: 20_000,
            max_pieces_per_pattern: 32,
            min_pattern_efficiency: 0.0,
            fallback_to_heuristic: true,
        }
    }
}

impl ExactConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_time_limit_ms(mut self, ms: u64) -> Self {
        self.time_limit_ms = ms;
        self
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    pub fn with_max_patterns(mut self, max_patterns: usize) -> Self {
        self.max_patterns = max_patterns;
        self
    }

    pub fn with_max_pieces_per_pattern(mut self, max_pieces: usize) -> Self {
        self.max_pieces_per_pattern = max_pieces;
        self
    }

    pub fn with_min_pattern_efficiency(mut self, efficiency: f64) -> Self {
        self.min_pattern_efficiency = efficiency;
        self
    }

    pub fn with_fallback(mut self, fallback: bool) -> Self {
        self.fallback_to_heuristic = fallback;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.max_items == 0 || self.max_patterns == 0 || self.max_pieces_per_pattern == 0 {
            return Err(Error::Configuration(
                "exact solver limits must be non-zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_pattern_efficiency) {
            return Err(Error::Configuration(format!(
                "min_pattern_efficiency must be within 0.0..=1.0, got {}",
                self.min_pattern_efficiency
            )));
        }
        Ok(())
    }
}

/// Parameters of one optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizeConfig {
    /// Blade kerf in mm, applied to every profile.
    pub cutting_gap: f64,
    pub gap_policy: GapPolicy,
    pub objective: Objective,
    /// Candidate stock bar lengths in mm.
    pub stock_lengths: Vec<f64>,
    /// Synthetic bars for oversized pieces are rounded up to a multiple of this.
    pub upsize_step: f64,
    /// Optimize profiles on the rayon thread pool.
    pub parallel: bool,
    pub exact: ExactConfig,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self {
            cutting_gap: 0.0,
            gap_policy: GapPolicy::default(),
            objective: Objective::default(),
            stock_lengths: Vec::new(),
            upsize_step: 100.0,
            parallel: true,
            exact: ExactConfig::default(),
        }
    }
}

impl OptimizeConfig {
    pub fn new(stock_lengths: Vec<f64>) -> Self {
        Self {
            stock_lengths,
            ..Self::default()
        }
    }

    pub fn with_gap(mut self, gap: f64) -> Self {
        self.cutting_gap = gap;
        self
    }

    pub fn with_gap_policy(mut self, policy: GapPolicy) -> Self {
        self.gap_policy = policy;
        self
    }

    pub fn with_objective(mut self, objective: Objective) -> Self {
        self.objective = objective;
        self
    }

    pub fn with_upsize_step(mut self, step: f64) -> Self {
        self.upsize_step = step;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_exact(mut self, exact: ExactConfig) -> Self {
        self.exact = exact;
        self
    }

    pub fn kerf(&self) -> Kerf {
        Kerf::new(self.cutting_gap, self.gap_policy)
    }

    pub fn max_stock_length(&self) -> Option<f64> {
        self.stock_lengths.iter().copied().reduce(f64::max)
    }

    pub fn validate(&self) -> Result<()> {
        if self.stock_lengths.is_empty() {
            return Err(Error::Configuration(
                "at least one stock length is required".to_string(),
            ));
        }
        if let Some(bad) = self
            .stock_lengths
            .iter()
            .find(|l| !l.is_finite() || **l <= 0.0)
        {
            return Err(Error::Configuration(format!(
                "stock lengths must be positive, got {bad}"
            )));
        }
        if !self.cutting_gap.is_finite() || self.cutting_gap < 0.0 {
            return Err(Error::Configuration(format!(
                "cutting gap must be non-negative, got {}",
                self.cutting_gap
            )));
        }
        if !self.upsize_step.is_finite() || self.upsize_step <= 0.0 {
            return Err(Error::Configuration(format!(
                "upsize step must be positive, got {}",
                self.upsize_step
            )));
        }
        self.exact.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stock_lengths_rejected() {
        let err = OptimizeConfig::new(vec![]).validate().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(OptimizeConfig::new(vec![6000.0, 0.0]).validate().is_err());
        assert!(OptimizeConfig::new(vec![6000.0, f64::NAN]).validate().is_err());
        assert!(OptimizeConfig::new(vec![6000.0]).with_gap(-1.0).validate().is_err());
        assert!(OptimizeConfig::new(vec![6000.0]).with_upsize_step(0.0).validate().is_err());
        let exact = ExactConfig::new().with_min_pattern_efficiency(1.5);
        assert!(OptimizeConfig::new(vec![6000.0]).with_exact(exact).validate().is_err());
    }

    #[test]
    fn test_builder_and_defaults() {
        let config = OptimizeConfig::new(vec![6000.0, 6500.0])
            .with_gap(5.0)
            .with_objective(Objective::MinBarCount);
        assert!(config.validate().is_ok());
        assert_eq!(config.max_stock_length(), Some(6500.0));
        assert_eq!(config.kerf().gap, 5.0);
        assert_eq!(config.gap_policy, GapPolicy::BetweenPieces);
        assert_eq!(config.exact.time_limit_ms, 30_000);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{"stock_lengths":[6000],"cutting_gap":10,"gap_policy":"per-piece"}"#;
        let config: OptimizeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.stock_lengths, vec![6000.0]);
        assert_eq!(config.gap_policy, GapPolicy::PerPiece);
        assert_eq!(config.objective, Objective::MaxEfficiency);
        assert!(config.parallel);
        assert!(config.exact.fallback_to_heuristic);
    }
}
