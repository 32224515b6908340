//! Shared test utilities for catalog testing

use crate::{
    config::{CatalogConfig, MatchMode},
    filter::FilterEngine,
    properties::{PolicyRecord, RawPolicy},
    store::RecordStore,
};
use serde_json::{json, Value};

/// Initialize logging for tests
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// The two-record catalog most scenarios start from.
pub fn scenario_payload() -> Value {
    json!([
        {"name": "Allow X", "key": "Software\\Policies\\X", "valueName": "Allow",
         "categoryPath": ["A", "B"], "tag": "Machine"},
        {"name": "Block Y", "key": "Software\\Policies\\Y", "valueName": "Block",
         "categoryPath": ["A", "C"], "tag": "User"}
    ])
}

const SEGMENTS: [&str; 6] = [
    "Windows Components",
    "System",
    "Network",
    "Microsoft Edge",
    "Control Panel",
    "Printers",
];

const WORDS: [&str; 8] = [
    "Allow", "Block", "Configure", "Prevent", "Turn off", "Enable", "Specify", "Hide",
];

const OBJECTS: [&str; 8] = [
    "telemetry",
    "password manager",
    "automatic updates",
    "remote assistance",
    "camera access",
    "printer sharing",
    "SmartScreen",
    "Lock screen",
];

/// A deterministic synthetic catalog of `count` records with varied depth, class, and text.
pub fn synthetic_payload(count: usize) -> Value {
    let records: Vec<Value> = (0..count)
        .map(|i| {
            let depth = 1 + i % 4;
            let path: Vec<&str> = (0..depth)
                .map(|level| SEGMENTS[(i / (level + 1) + level) % SEGMENTS.len()])
                .collect();
            let class = ["Machine", "User", "Both"][i % 3];
            let mut record = json!({
                "name": format!("{} {} {i}", WORDS[i % WORDS.len()], OBJECTS[(i / 3) % OBJECTS.len()]),
                "key": format!("Software\\Policies\\Vendor{}", i % 17),
                "valueName": format!("Value{}", i % 5),
                "explainText": format!("Controls {} on this device.", OBJECTS[(i / 3) % OBJECTS.len()]),
                "admxFile": format!("{}.admx", SEGMENTS[i % SEGMENTS.len()].replace(' ', "")),
                "categoryPath": path,
            });
            // Leave some records without a class so the Both default is exercised.
            if i % 7 != 0 {
                record["policyClass"] = json!(class);
            }
            record
        })
        .collect();
    Value::Array(records)
}

pub fn store_from(payload: Value, config: &CatalogConfig) -> RecordStore {
    init_logging();
    let raw: Vec<RawPolicy> = serde_json::from_value(payload).expect("test payload is well-formed");
    RecordStore::load(raw, config).expect("test payload loads")
}

pub fn engine_from(payload: Value, config: &CatalogConfig) -> FilterEngine {
    FilterEngine::new(store_from(payload, config), config)
}

pub fn fuzzy_config() -> CatalogConfig {
    CatalogConfig {
        match_mode: MatchMode::Fuzzy,
        ..Default::default()
    }
}

pub fn names<'a>(records: impl IntoIterator<Item = &'a PolicyRecord>) -> Vec<&'a str> {
    records.into_iter().map(|r| r.name.as_str()).collect()
}
