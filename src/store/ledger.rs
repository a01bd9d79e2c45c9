//! YAML sprint ledger.
//!
//! ```yaml
//! project: shop
//! development_status:
//!   epic-3: in-progress
//!   3-1-user-login: done
//!   3-2-password-reset: ready-for-dev
//! ```
//!
//! Only the `development_status` mapping is interpreted; every other key is
//! carried through untouched on write.

use super::{LedgerStore, ledger_key_matches};
use crate::errors::StoreError;
use crate::story::{StoryId, StoryStatus};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

const STATUS_SECTION: &str = "development_status";

#[derive(Debug, Clone)]
pub struct YamlLedger {
    path: PathBuf,
}

impl YamlLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the whole document. A missing file is an empty ledger.
    fn load(&self) -> Result<Mapping, StoreError> {
        if !self.path.exists() {
            return Ok(Mapping::new());
        }
        let content = std::fs::read_to_string(&self.path).map_err(|source| StoreError::Read {
            path: self.path.clone(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(Mapping::new());
        }
        match serde_yaml::from_str::<Value>(&content) {
            Ok(Value::Mapping(map)) => Ok(map),
            Ok(Value::Null) => Ok(Mapping::new()),
            Ok(_) => Err(StoreError::Parse {
                path: self.path.clone(),
                message: "top level is not a mapping".to_string(),
            }),
            Err(e) => Err(StoreError::Parse {
                path: self.path.clone(),
                message: e.to_string(),
            }),
        }
    }

    fn save(&self, doc: &Mapping) -> Result<(), StoreError> {
        let content = serde_yaml::to_string(doc).map_err(|e| StoreError::Parse {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Write {
                path: self.path.clone(),
                source,
            })?;
        }
        // Write-then-rename so a crash never leaves a truncated ledger behind.
        let tmp = self.path.with_extension("yaml.tmp");
        std::fs::write(&tmp, content).map_err(|source| StoreError::Write {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })
    }

    /// All `(key, status)` entries in ledger order.
    pub fn entries(&self) -> Result<Vec<(String, StoryStatus)>, StoreError> {
        let doc = self.load()?;
        let Some(Value::Mapping(section)) = doc.get(STATUS_SECTION) else {
            return Ok(Vec::new());
        };
        Ok(section
            .iter()
            .filter_map(|(k, v)| {
                let key = k.as_str()?.to_string();
                let value = scalar_to_string(v)?;
                Some((key, StoryStatus::parse(&value)))
            })
            .collect())
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl LedgerStore for YamlLedger {
    fn status(&self, id: &StoryId) -> Result<Option<StoryStatus>, StoreError> {
        Ok(self
            .entries()?
            .into_iter()
            .find(|(key, _)| ledger_key_matches(key, id))
            .map(|(_, status)| status))
    }

    fn upsert(&self, id: &StoryId, status: &StoryStatus) -> Result<(), StoreError> {
        let mut doc = self.load()?;
        let section = doc
            .entry(Value::String(STATUS_SECTION.to_string()))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
        if !section.is_mapping() {
            *section = Value::Mapping(Mapping::new());
        }
        let Some(entries) = section.as_mapping_mut() else {
            return Err(StoreError::Parse {
                path: self.path.clone(),
                message: format!("{} is not a mapping", STATUS_SECTION),
            });
        };

        let key = entries
            .keys()
            .filter_map(Value::as_str)
            .find(|key| ledger_key_matches(key, id))
            .map(str::to_string)
            .unwrap_or_else(|| id.to_string());
        entries.insert(Value::String(key), Value::String(status.to_string()));

        self.save(&doc)
    }
}
