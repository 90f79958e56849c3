//! Demand import from CSV.
//!
//! Column headers may be given in English or Vietnamese; both map onto the
//! same fields. Rows are checked for well-typed, positive values before they
//! reach the optimizer.

use std::io::Read;
use std::path::Path;

use thiserror::Error;

use crate::types::DemandRow;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to read demand file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<&'static str>),

    #[error("row {row}: {column} must be a number, got '{value}'")]
    InvalidNumber {
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("row {row}: {message}")]
    OutOfRange { row: usize, message: String },

    #[error("demand file has no rows")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    ProfileCode,
    Length,
    Quantity,
    DoorCode,
}

impl Column {
    fn label(self) -> &'static str {
        match self {
            Column::ProfileCode => "Profile Code",
            Column::Length => "Length",
            Column::Quantity => "Quantity",
            Column::DoorCode => "Door Code",
        }
    }
}

/// Accepted header spellings, compared after trimming and lowercasing.
const HEADER_ALIASES: &[(&str, Column)] = &[
    ("profile code", Column::ProfileCode),
    ("profile_code", Column::ProfileCode),
    ("mã thanh", Column::ProfileCode),
    ("length", Column::Length),
    ("chiều dài", Column::Length),
    ("quantity", Column::Quantity),
    ("qty", Column::Quantity),
    ("số lượng", Column::Quantity),
    ("door code", Column::DoorCode),
    ("door_code", Column::DoorCode),
    ("mã cửa", Column::DoorCode),
];

fn resolve_header(header: &str) -> Option<Column> {
    let normalized = header.trim_start_matches('\u{feff}').trim().to_lowercase();
    HEADER_ALIASES
        .iter()
        .find(|(alias, _)| *alias == normalized)
        .map(|&(_, column)| column)
}

pub fn read_demand_file(path: impl AsRef<Path>) -> Result<Vec<DemandRow>, InputError> {
    let file = std::fs::File::open(path)?;
    read_demand(file)
}

pub fn read_demand<R: Read>(reader: R) -> Result<Vec<DemandRow>, InputError> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = csv.headers()?.clone();
    let position = |column: Column| headers.iter().position(|h| resolve_header(h) == Some(column));
    let profile_idx = position(Column::ProfileCode);
    let length_idx = position(Column::Length);
    let quantity_idx = position(Column::Quantity);
    let door_idx = position(Column::DoorCode);

    let (Some(profile_idx), Some(length_idx), Some(quantity_idx)) =
        (profile_idx, length_idx, quantity_idx)
    else {
        let missing = [
            (profile_idx, Column::ProfileCode),
            (length_idx, Column::Length),
            (quantity_idx, Column::Quantity),
        ]
        .iter()
        .filter(|(idx, _)| idx.is_none())
        .map(|(_, column)| column.label())
        .collect();
        return Err(InputError::MissingColumns(missing));
    };

    let mut rows = Vec::new();
    for (idx, record) in csv.records().enumerate() {
        let record = record?;
        let row = idx + 1;
        let field = |i: usize| record.get(i).unwrap_or("");
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }

        let profile_code = field(profile_idx).to_string();
        if profile_code.is_empty() {
            return Err(InputError::OutOfRange {
                row,
                message: "profile code must not be empty".to_string(),
            });
        }
        let length = parse_number(row, Column::Length, field(length_idx))?;
        if length <= 0.0 {
            return Err(InputError::OutOfRange {
                row,
                message: format!("length must be positive, got {length}"),
            });
        }
        let quantity = parse_number(row, Column::Quantity, field(quantity_idx))?;
        if quantity <= 0.0 || quantity.fract() != 0.0 || quantity > u32::MAX as f64 {
            return Err(InputError::OutOfRange {
                row,
                message: format!("quantity must be a positive whole number, got {quantity}"),
            });
        }
        let door_code = door_idx
            .map(field)
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        rows.push(DemandRow {
            profile_code,
            length,
            quantity: quantity as u32,
            door_code,
        });
    }

    if rows.is_empty() {
        return Err(InputError::Empty);
    }
    tracing::debug!(rows = rows.len(), "demand rows imported");
    Ok(rows)
}

fn parse_number(row: usize, column: Column, value: &str) -> Result<f64, InputError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| InputError::InvalidNumber {
            row,
            column: column.label(),
            value: value.to_string(),
        })
}
