//! Run history: past (input, output) pairs keyed by a generated id.
//!
//! The optimizer never touches the store; callers save runs after a
//! successful `optimize` call.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::OptimizeConfig;
use crate::types::{CuttingPlan, DemandRow};

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("run {0} not found")]
    NotFound(Uuid),

    #[error("history storage failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("history record is corrupt: {0}")]
    Json(#[from] serde_json::Error),

    #[error("history store lock poisoned")]
    Poisoned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub demand: Vec<DemandRow>,
    pub config: OptimizeConfig,
    pub plan: CuttingPlan,
}

impl RunRecord {
    pub fn new(demand: Vec<DemandRow>, config: OptimizeConfig, plan: CuttingPlan) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            demand,
            config,
            plan,
        }
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            id: self.id,
            created_at: self.created_at,
            profiles: self.plan.summaries.len(),
            bars: self.plan.bar_count(),
            objective: self.config.objective.to_string(),
        }
    }
}

/// Listing entry for a stored run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub profiles: usize,
    pub bars: usize,
    pub objective: String,
}

pub trait HistoryStore: Send + Sync {
    fn save(&self, record: &RunRecord) -> Result<(), HistoryError>;

    fn load(&self, id: Uuid) -> Result<RunRecord, HistoryError>;

    /// Stored runs, newest first.
    fn list(&self) -> Result<Vec<RunSummary>, HistoryError>;

    fn delete(&self, id: Uuid) -> Result<(), HistoryError>;
}

fn newest_first(mut summaries: Vec<RunSummary>) -> Vec<RunSummary> {
    summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
    summaries
}

#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    records: Mutex<HashMap<Uuid, RunRecord>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn save(&self, record: &RunRecord) -> Result<(), HistoryError> {
        let mut records = self.records.lock().map_err(|_| HistoryError::Poisoned)?;
        records.insert(record.id, record.clone());
        Ok(())
    }

    fn load(&self, id: Uuid) -> Result<RunRecord, HistoryError> {
        let records = self.records.lock().map_err(|_| HistoryError::Poisoned)?;
        records.get(&id).cloned().ok_or(HistoryError::NotFound(id))
    }

    fn list(&self) -> Result<Vec<RunSummary>, HistoryError> {
        let records = self.records.lock().map_err(|_| HistoryError::Poisoned)?;
        Ok(newest_first(records.values().map(RunRecord::summary).collect()))
    }

    fn delete(&self, id: Uuid) -> Result<(), HistoryError> {
        let mut records = self.records.lock().map_err(|_| HistoryError::Poisoned)?;
        records
            .remove(&id)
            .map(|_| ())
            .ok_or(HistoryError::NotFound(id))
    }
}

/// One pretty-printed JSON file per run, named `<id>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileHistoryStore {
    dir: PathBuf,
}

impl JsonFileHistoryStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, HistoryError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

impl HistoryStore for JsonFileHistoryStore {
    fn save(&self, record: &RunRecord) -> Result<(), HistoryError> {
        let json = serde_json::to_vec_pretty(record)?;
        std::fs::write(self.path_for(record.id), json)?;
        Ok(())
    }

    fn load(&self, id: Uuid) -> Result<RunRecord, HistoryError> {
        let bytes = match std::fs::read(self.path_for(id)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(HistoryError::NotFound(id));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn list(&self) -> Result<Vec<RunSummary>, HistoryError> {
        let mut summaries = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| Uuid::parse_str(s).ok())
            else {
                continue;
            };
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match self.load(id) {
                Ok(record) => summaries.push(record.summary()),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping history record")
                }
            }
        }
        Ok(newest_first(summaries))
    }

    fn delete(&self, id: Uuid) -> Result<(), HistoryError> {
        match std::fs::remove_file(self.path_for(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(HistoryError::NotFound(id)),
            Err(e) => Err(e.into()),
        }
    }
}
