//! Export codes: the whole progress root as one copy/paste string.
//!
//! Format: standard base64 (padded) of the JSON [`ExportPayload`].
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

use super::{ByteStore, ProgressKey, ProgressRecord, ProgressRoot, ProgressStore, StoreError};
use crate::bus::ChangeEvent;
use crate::constants::{
    EXPORT_SCHEMA_VERSION, LOG_STORE_EXPORT, LOG_STORE_IMPORT, LOG_STORE_IMPORT_SKIP,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPayload {
    pub schema_version: u32,
    pub records: BTreeMap<String, ProgressRecord>,
    #[serde(default)]
    pub preferences: Map<String, Value>,
}

/// Why an import was rejected. The store is untouched in every case.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("export code is not valid text: {0}")]
    Encoding(String),
    #[error("export code does not contain readable progress: {0}")]
    Parse(String),
    #[error("export code uses schema version {found}, this build reads version {supported}")]
    UnsupportedVersion { found: u64, supported: u32 },
    #[error("export code has no records")]
    MissingRecords,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImportSummary {
    pub imported: usize,
    /// Storage keys of records that could not be identified.
    pub skipped: Vec<String>,
}

fn decode(code: &str) -> Result<Value, ImportError> {
    let compact: String = code.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = BASE64
        .decode(compact.as_bytes())
        .map_err(|err| ImportError::Encoding(err.to_string()))?;
    let text = String::from_utf8(bytes).map_err(|err| ImportError::Encoding(err.to_string()))?;
    serde_json::from_str(&text).map_err(|err| ImportError::Parse(err.to_string()))
}

fn version_field(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Identity from the record's own fields, else from its storage key.
fn identify(storage_key: &str, record: &Map<String, Value>) -> Option<ProgressKey> {
    let entity = record
        .get("entityId")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty());
    let version = record.get("version").and_then(version_field);
    match (entity, version) {
        (Some(entity), Some(version)) => Some(ProgressKey::new(entity, version)),
        _ => ProgressKey::parse(storage_key),
    }
}

fn rebuild(storage_key: &str, value: &Value) -> Option<ProgressRecord> {
    let fields = value.as_object()?;
    let key = identify(storage_key, fields)?;
    let mut fields = fields.clone();
    fields.insert("entityId".into(), Value::String(key.entity_id.clone()));
    fields.insert("version".into(), Value::from(key.version));
    serde_json::from_value(Value::Object(fields)).ok()
}

impl<S: ByteStore> ProgressStore<S> {
    /// Encode every record plus preferences as one export code.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn export(&self) -> Result<String, StoreError> {
        let payload = ExportPayload {
            schema_version: EXPORT_SCHEMA_VERSION,
            records: self.root.records.clone(),
            preferences: self.root.preferences.clone(),
        };
        let json = serde_json::to_string(&payload)?;
        log::info!("{LOG_STORE_EXPORT}: {} records", payload.records.len());
        Ok(BASE64.encode(json))
    }

    /// Replace the whole root with the contents of `code`.
    ///
    /// Records whose identity can be recovered neither from their fields nor
    /// from their storage key are skipped. Undo logs of every record touched
    /// by the swap are cleared so undo cannot resurrect pre-import state.
    ///
    /// # Errors
    ///
    /// Returns an error if the code cannot be decoded, parsed, carries another
    /// schema version, or the new root cannot be written.
    pub fn import(&mut self, code: &str) -> Result<ImportSummary, ImportError> {
        let payload = decode(code)?;
        let found = payload
            .get("schemaVersion")
            .and_then(Value::as_u64)
            .ok_or_else(|| ImportError::Parse("missing schemaVersion".into()))?;
        if found != u64::from(EXPORT_SCHEMA_VERSION) {
            return Err(ImportError::UnsupportedVersion {
                found,
                supported: EXPORT_SCHEMA_VERSION,
            });
        }
        let entries = payload
            .get("records")
            .and_then(Value::as_object)
            .ok_or(ImportError::MissingRecords)?;

        let mut summary = ImportSummary::default();
        let mut root = ProgressRoot {
            records: BTreeMap::new(),
            preferences: payload
                .get("preferences")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        };
        for (storage_key, value) in entries {
            match rebuild(storage_key, value) {
                Some(record) => {
                    root.records.insert(record.key().storage_key(), record);
                }
                None => {
                    log::warn!("{LOG_STORE_IMPORT_SKIP}: {storage_key}");
                    summary.skipped.push(storage_key.clone());
                }
            }
        }
        summary.imported = root.records.len();

        let stale: Vec<ProgressKey> = self
            .root
            .records
            .values()
            .chain(root.records.values())
            .map(ProgressRecord::key)
            .collect();
        self.commit(root)?;
        for key in stale {
            if let Err(err) = self.backend.remove(&key.history_key()) {
                log::warn!("{LOG_STORE_IMPORT}: could not clear history {key}: {err}");
            }
        }

        log::info!(
            "{LOG_STORE_IMPORT}: {} records, {} skipped",
            summary.imported,
            summary.skipped.len()
        );
        self.bus.publish(&ChangeEvent::Imported {
            records: summary.imported,
        });
        Ok(summary)
    }
}
