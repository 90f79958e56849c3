use serde::{Deserialize, Deserializer, Serialize};

/// Slack for floating point capacity checks, in mm.
pub const LENGTH_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandRow {
    pub profile_code: String,
    pub length: f64,
    #[serde(deserialize_with = "deserialize_quantity")]
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub door_code: Option<String>,
}

impl DemandRow {
    pub fn new(profile_code: impl Into<String>, length: f64, quantity: u32) -> Self {
        Self {
            profile_code: profile_code.into(),
            length,
            quantity,
            door_code: None,
        }
    }

    pub fn with_door_code(mut self, door_code: impl Into<String>) -> Self {
        self.door_code = Some(door_code.into());
        self
    }
}

/// Accepts `3` as well as `3.0`; spreadsheets and JS clients routinely send
/// whole numbers as floats.
pub fn deserialize_quantity<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if value.fract() != 0.0 || value < 0.0 || value > u32::MAX as f64 {
        return Err(serde::de::Error::custom(format!(
            "quantity must be a non-negative whole number, got {value}"
        )));
    }
    Ok(value as u32)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub profile_code: String,
    pub length: f64,
    pub item_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub door_code: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GapPolicy {
    /// One gap between each pair of adjacent pieces: `(n - 1) * gap` per bar.
    #[default]
    BetweenPieces,
    /// One gap charged for every piece: `n * gap` per bar.
    PerPiece,
}

/// Cutting gap together with the way it is charged on a bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Kerf {
    pub gap: f64,
    pub policy: GapPolicy,
}

impl Kerf {
    pub fn new(gap: f64, policy: GapPolicy) -> Self {
        Self { gap, policy }
    }

    /// Capacity a piece consumes when it is the `index`-th piece on its bar.
    pub fn piece_cost(&self, length: f64, index: usize) -> f64 {
        match self.policy {
            GapPolicy::BetweenPieces if index == 0 => length,
            _ => length + self.gap,
        }
    }

    /// Capacity a piece needs on an empty bar.
    pub fn requirement(&self, length: f64) -> f64 {
        self.piece_cost(length, 0)
    }

    /// Total gap charged on a bar holding `pieces` pieces.
    pub fn gaps(&self, pieces: usize) -> f64 {
        let charged = match self.policy {
            GapPolicy::BetweenPieces => pieces.saturating_sub(1),
            GapPolicy::PerPiece => pieces,
        };
        charged as f64 * self.gap
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Objective {
    #[default]
    MaxEfficiency,
    MinBarCount,
    #[serde(alias = "flexible")]
    FlexibleMultiLength,
    Exact,
}

impl std::fmt::Display for Objective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Objective::MaxEfficiency => "max-efficiency",
            Objective::MinBarCount => "min-bar-count",
            Objective::FlexibleMultiLength => "flexible",
            Objective::Exact => "exact",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SolveStatus {
    /// Heuristic plan, or an exact search whose patterns were pruned by efficiency.
    #[default]
    Heuristic,
    /// Exact search space exhausted; bar count is minimal over the enumerated patterns.
    Optimal,
    TimeLimitReached,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub profile_code: String,
    pub bar_number: u32,
    pub stock_length: f64,
    pub items: Vec<Item>,
    pub used_length: f64,
    pub remaining_length: f64,
    pub efficiency: f64,
    #[serde(default)]
    pub upsized: bool,
}

impl Bar {
    pub fn piece_count(&self) -> usize {
        self.items.len()
    }

    pub fn lengths(&self) -> impl Iterator<Item = f64> + '_ {
        self.items.iter().map(|i| i.length)
    }

    pub fn pattern(&self) -> String {
        self.lengths()
            .map(format_length)
            .collect::<Vec<_>>()
            .join("+")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub profile_code: String,
    pub item_id: String,
    pub length: f64,
    pub bar_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub door_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub profile_code: String,
    pub total_pieces: usize,
    pub total_bars_used: usize,
    pub total_length_needed: f64,
    pub total_stock_length: f64,
    pub waste: f64,
    pub overall_efficiency: f64,
    pub average_bar_efficiency: f64,
    pub upsized_bars: usize,
    pub solve_status: SolveStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnassignedItem {
    pub item: Item,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Warning {
    UnfittablePiece {
        profile_code: String,
        length: f64,
        synthetic_stock_length: f64,
    },
    ExactFallback {
        profile_code: String,
        reason: String,
    },
    ExactTimeLimit {
        profile_code: String,
        elapsed_ms: u64,
    },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::UnfittablePiece {
                profile_code,
                length,
                synthetic_stock_length,
            } => write!(
                f,
                "{profile_code}: piece {} exceeds every stock length, cut from a {} bar",
                format_length(*length),
                format_length(*synthetic_stock_length)
            ),
            Warning::ExactFallback {
                profile_code,
                reason,
            } => write!(
                f,
                "{profile_code}: exact solver skipped ({reason}), used min-bar-count"
            ),
            Warning::ExactTimeLimit {
                profile_code,
                elapsed_ms,
            } => write!(
                f,
                "{profile_code}: exact search stopped after {elapsed_ms}ms, best plan found is returned"
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CuttingPlan {
    pub results: Vec<ResultRow>,
    pub patterns: Vec<Bar>,
    pub summaries: Vec<ProfileSummary>,
    pub unassigned: Vec<UnassignedItem>,
    pub warnings: Vec<Warning>,
}

impl CuttingPlan {
    pub fn bar_count(&self) -> usize {
        self.patterns.len()
    }

    pub fn bars_for<'a>(&'a self, profile_code: &'a str) -> impl Iterator<Item = &'a Bar> + 'a {
        self.patterns
            .iter()
            .filter(move |b| b.profile_code == profile_code)
    }

    pub fn summary_for(&self, profile_code: &str) -> Option<&ProfileSummary> {
        self.summaries
            .iter()
            .find(|s| s.profile_code == profile_code)
    }
}

/// Formats a length in mm, dropping the fraction when it is zero.
pub fn format_length(length: f64) -> String {
    if length.fract() == 0.0 && length.abs() < 1e15 {
        format!("{}", length as i64)
    } else {
        format!("{length}")
    }
}
