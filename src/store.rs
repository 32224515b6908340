//! The immutable, ordered record store.
//!
//! A [RecordStore] is populated once by [RecordStore::load] or [RecordStore::from_json] and never
//! changes afterwards. Store order is input order minus any skipped records; every other stage of
//! the pipeline refers to records by [RecordId] or by their position in this order.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::{
    config::{CatalogConfig, InvalidRecordPolicy},
    error::CatalogError,
    properties::{PolicyRecord, RawPolicy, RecordId},
    query::SearchIndex,
};

/// A record left out of the store by [InvalidRecordPolicy::Skip].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDiagnostic {
    /// Position in the input sequence.
    pub index: usize,
    /// The record's name, when it had a usable one.
    pub name: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    pub accepted: usize,
    pub rejected: Vec<RecordDiagnostic>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: Vec<PolicyRecord>,
    by_id: BTreeMap<RecordId, usize>,
    index: SearchIndex,
    report: LoadReport,
}

impl RecordStore {
    /// Validate `records`, assign ids, and build the search index.
    pub fn load<I>(records: I, config: &CatalogConfig) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = RawPolicy>,
    {
        Self::admit(records.into_iter().map(Ok), config)
    }

    /// Parse a JSON array payload and [RecordStore::load] it. Elements are deserialized one at a
    /// time, so a malformed element is treated like any other invalid record.
    pub fn from_json(data: &str, config: &CatalogConfig) -> Result<Self, CatalogError> {
        let payload: Value = serde_json::from_str(data)?;
        let elements = match payload {
            Value::Array(elements) => elements,
            other => {
                return Err(CatalogError::Serialization(format!(
                    "policy payload must be a JSON array, got {}",
                    json_type_name(&other)
                )))
            }
        };
        Self::admit(
            elements.into_iter().map(|element| {
                let name = element
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                serde_json::from_value::<RawPolicy>(element).map_err(|e| (name, e.to_string()))
            }),
            config,
        )
    }

    fn admit<I>(entries: I, config: &CatalogConfig) -> Result<Self, CatalogError>
    where
        I: Iterator<Item = Result<RawPolicy, (Option<String>, String)>>,
    {
        let mut store = RecordStore::default();
        let mut ordinals: BTreeMap<(String, String), usize> = BTreeMap::new();

        for (index, entry) in entries.enumerate() {
            let validated = entry
                .map_err(|(name, reason)| (name, CatalogError::validation(index, reason)))
                .and_then(|raw| {
                    let name = raw.name.clone();
                    raw.into_record(index, config).map_err(|e| (name, e))
                });
            let mut record = match validated {
                Ok(record) => record,
                Err((name, err)) => match config.invalid_records {
                    InvalidRecordPolicy::Abort => return Err(err),
                    InvalidRecordPolicy::Skip => {
                        tracing::warn!("Skipping policy record: {err}");
                        let reason = match err {
                            CatalogError::Validation { reason, .. } => reason,
                            other => other.to_string(),
                        };
                        store.report.rejected.push(RecordDiagnostic {
                            index,
                            name,
                            reason,
                        });
                        continue;
                    }
                },
            };

            let key = record.key.clone().unwrap_or_default();
            let value_name = record.value_name.clone().unwrap_or_default();
            let ordinal = ordinals.entry((key, value_name)).or_insert(0);
            record.id = RecordId::derive(
                record.key.as_deref().unwrap_or_default(),
                record.value_name.as_deref().unwrap_or_default(),
                *ordinal,
            );
            *ordinal += 1;

            let position = store.records.len();
            if let Some(existing) = store.by_id.insert(record.id, position) {
                return Err(CatalogError::Integrity(format!(
                    "record {index} ('{}') derived id {} already held by '{}'",
                    record.name, record.id, store.records[existing].name
                )));
            }
            store.records.push(record);
        }

        store.index = SearchIndex::build(&store.records);
        store.report.accepted = store.records.len();
        tracing::info!(
            "Loaded policy catalog: {} records, {} rejected",
            store.report.accepted,
            store.report.rejected.len()
        );
        Ok(store)
    }

    pub fn get(&self, id: &RecordId) -> Result<&PolicyRecord, CatalogError> {
        self.position(id)
            .map(|position| &self.records[position])
            .ok_or_else(|| CatalogError::NotFound(format!("no policy record with id {id}")))
    }

    /// Store ordinal of `id`.
    pub fn position(&self, id: &RecordId) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    pub fn at(&self, position: usize) -> Option<&PolicyRecord> {
        self.records.get(position)
    }

    /// All records, in store order.
    pub fn records(&self) -> &[PolicyRecord] {
        &self.records
    }

    pub fn ids(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.records.iter().map(|record| record.id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn search_index(&self) -> &SearchIndex {
        &self.index
    }

    pub fn report(&self) -> &LoadReport {
        &self.report
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
