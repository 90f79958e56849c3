use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::types::{DemandRow, Item};

/// Expands demand rows into one item per physical piece.
///
/// Item ids are `"{profile_code}_{n}"` with `n` counting from 1 across every
/// row of the same profile. All rows are validated before anything is expanded.
pub fn expand_demands(rows: &[DemandRow]) -> Result<Vec<Item>> {
    for (idx, row) in rows.iter().enumerate() {
        validate_row(idx, row)?;
    }

    let mut sequence: HashMap<&str, usize> = HashMap::new();
    let mut items = Vec::with_capacity(rows.iter().map(|r| r.quantity as usize).sum());
    for row in rows {
        let profile_code = row.profile_code.trim();
        let next = sequence.entry(profile_code).or_insert(0);
        for _ in 0..row.quantity {
            *next += 1;
            items.push(Item {
                profile_code: profile_code.to_string(),
                length: row.length,
                item_id: format!("{profile_code}_{next}"),
                door_code: row.door_code.clone(),
            });
        }
    }
    Ok(items)
}

fn validate_row(idx: usize, row: &DemandRow) -> Result<()> {
    let invalid = |message: String| Error::Validation {
        profile_code: row.profile_code.clone(),
        row: idx + 1,
        message,
    };
    if row.profile_code.trim().is_empty() {
        return Err(invalid("profile code must not be empty".to_string()));
    }
    if !row.length.is_finite() || row.length <= 0.0 {
        return Err(invalid(format!("length must be positive, got {}", row.length)));
    }
    if row.quantity == 0 {
        return Err(invalid("quantity must be positive, got 0".to_string()));
    }
    Ok(())
}

/// Groups items by profile code, keeping the order in which profiles first appear.
pub fn group_by_profile(items: Vec<Item>) -> Vec<(String, Vec<Item>)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<Item>)> = Vec::new();
    for item in items {
        match index.get(&item.profile_code) {
            Some(&gi) => groups[gi].1.push(item),
            None => {
                index.insert(item.profile_code.clone(), groups.len());
                groups.push((item.profile_code.clone(), vec![item]));
            }
        }
    }
    groups
}
