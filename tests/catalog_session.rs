//! A browsing session over the bundled fixture, driven the way a presentation layer drives it:
//! config from disk, a channel subscriber, and debounced query edits.

mod common;

use common::*;
use policy_catalog::{
    config::{CatalogConfig, InvalidRecordPolicy, MatchMode},
    debounce::QueryDebouncer,
    event::{CatalogEvent, Notification, ViewSnapshot},
    properties::{CategoryPath, PolicyClass},
    view::ViewProjector,
    CatalogError, ErrorKind,
};
use tempfile::TempDir;
use test_log::test;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

fn next_view(rx: &mut UnboundedReceiver<Notification>) -> ViewSnapshot {
    match rx.try_recv().expect("a notification is waiting") {
        Notification::FilterChanged(view) => view,
        other => panic!("expected a view, got {other}"),
    }
}

fn record_names(projector: &ViewProjector) -> Vec<String> {
    projector
        .view()
        .records
        .iter()
        .map(|r| r.name.clone())
        .collect()
}

#[test]
fn test_fixture_loads_with_report() {
    init_logging();
    let projector =
        ViewProjector::from_json(&fixture_payload(), &CatalogConfig::default(), Vec::new())
            .unwrap();
    let store = projector.engine().store();
    assert_eq!(store.len(), 8);

    let report = store.report();
    assert_eq!(report.accepted, 8);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].index, 6);
    assert_eq!(report.rejected[0].name, None);

    let tree = projector.engine().tree();
    let roots: Vec<&String> = tree.root().children.keys().collect();
    assert_eq!(
        roots,
        vec![
            "Control Panel",
            "Microsoft Edge",
            "Microsoft Edge - Default Settings",
            "Start Menu and Taskbar",
            "System",
            "Uncategorized",
            "Windows Components",
        ]
    );
    assert_eq!(
        tree.find(&CategoryPath::new(["System"]))
            .unwrap()
            .record_count(),
        2
    );

    // Two records share a registry value; both get distinct ids.
    let edge: Vec<_> = store
        .records()
        .iter()
        .filter(|r| r.value_name.as_deref() == Some("PasswordManagerEnabled"))
        .map(|r| r.id)
        .collect();
    assert_eq!(edge.len(), 2);
    assert_ne!(edge[0], edge[1]);
}

#[test]
fn test_debounced_session_over_channel() {
    init_logging();
    let config = CatalogConfig::default();
    let (tx, mut rx) = unbounded_channel();
    let mut projector = ViewProjector::from_json(&fixture_payload(), &config, Vec::new()).unwrap();
    projector.subscribe(Box::new(tx));
    let initial = next_view(&mut rx);
    assert_eq!(initial.records.len(), 8);

    let mut debouncer = QueryDebouncer::from_config(&config);
    for (text, at) in [("p", 0), ("pa", 50), ("pas", 90), ("pass", 120)] {
        debouncer.push(text, at);
        assert_eq!(debouncer.poll(at), None);
    }
    assert_eq!(debouncer.poll(200), None);
    let released = debouncer.poll(420).unwrap();
    projector.dispatch(CatalogEvent::SetQuery(released)).unwrap();

    // One burst, one recomputation.
    let view = next_view(&mut rx);
    assert!(rx.try_recv().is_err());
    assert_eq!(view.state.query_text, "pass");
    assert_eq!(view.records.len(), 2);
    assert!(view.revision > initial.revision);
    assert_eq!(
        record_names(&projector),
        vec![
            "Configure password manager",
            "Configure password manager (recommended)"
        ]
    );

    projector
        .dispatch(CatalogEvent::ToggleTag(PolicyClass::Both))
        .unwrap();
    let view = next_view(&mut rx);
    assert!(view.records.is_empty());
    assert!(view.tree.children.is_empty());

    projector.dispatch(CatalogEvent::ResetFilters).unwrap();
    let view = next_view(&mut rx);
    assert_eq!(view.records, initial.records);
    assert_eq!(view.tree, initial.tree);
    assert_eq!(view.state, initial.state);
}

#[test]
fn test_selecting_a_category_shows_its_full_contents() {
    init_logging();
    let mut projector =
        ViewProjector::from_json(&fixture_payload(), &CatalogConfig::default(), Vec::new())
            .unwrap();
    projector
        .dispatch(CatalogEvent::SetQuery("advertising".into()))
        .unwrap();
    assert_eq!(record_names(&projector), vec!["Turn off the advertising ID"]);

    projector
        .dispatch(CatalogEvent::SelectNode(CategoryPath::new(["System"])))
        .unwrap();
    assert_eq!(
        record_names(&projector),
        vec![
            "Turn off the advertising ID",
            "Turn off Windows Update device driver searching"
        ]
    );

    let nav = projector.engine().tree().nav_tree(" → ");
    let node = nav
        .get_path(&CategoryPath::new([
            "System",
            "Internet Communication Management",
        ]))
        .unwrap();
    assert_eq!(node.count, 1);
    assert_eq!(node.title, "System → Internet Communication Management");
    assert_eq!(node.parent.as_deref(), Some(r#"["System"]"#));

    projector.dispatch(CatalogEvent::ClearSelection).unwrap();
    assert_eq!(record_names(&projector), vec!["Turn off the advertising ID"]);
}

#[test]
fn test_config_from_disk() {
    init_logging();
    let temp_dir = TempDir::new().unwrap();
    let path = write_config(
        &temp_dir,
        r#"
match_mode = "fuzzy"
debounce_ms = 150
"#,
    );
    let config = CatalogConfig::from_path(&path).unwrap();
    assert_eq!(config.match_mode, MatchMode::Fuzzy);
    assert_eq!(QueryDebouncer::from_config(&config).window_ms(), 150);

    let mut projector = ViewProjector::from_json(&fixture_payload(), &config, Vec::new()).unwrap();
    projector
        .dispatch(CatalogEvent::SetQuery("cortanna".into()))
        .unwrap();
    let view = projector.view();
    assert_eq!(view.records[0].name, "Allow Cortana");
    assert!(view.scores.unwrap()[0] > 0.0);

    let strict = write_config(&temp_dir, r#"invalid_records = "abort""#);
    let config = CatalogConfig::from_path(&strict).unwrap();
    assert_eq!(config.invalid_records, InvalidRecordPolicy::Abort);
    let err = ViewProjector::from_json(&fixture_payload(), &config, Vec::new())
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_bad_config_is_a_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_config(&temp_dir, "fuzzy_threshold = 2.5");
    let err = CatalogConfig::from_path(&path).unwrap_err();
    assert!(matches!(err, CatalogError::Config(_)));

    let missing = temp_dir.path().join("absent.toml");
    let err = CatalogConfig::from_path(&missing).unwrap_err();
    assert!(matches!(err, CatalogError::NotFound(_)));
}

#[test]
fn test_records_pass_through_unknown_attributes() {
    let projector =
        ViewProjector::from_json(&fixture_payload(), &CatalogConfig::default(), Vec::new())
            .unwrap();
    let json = serde_json::to_value(projector.view()).unwrap();
    let cortana = &json["records"][0];
    assert_eq!(cortana["name"], "Allow Cortana");
    assert_eq!(cortana["supportedOn"], "At least Windows 10");
    assert_eq!(cortana["categoryPath"][1], "Search");
    let id = cortana["id"].as_str().unwrap();
    let record = projector
        .engine()
        .store()
        .get(&id.try_into().unwrap())
        .unwrap();
    assert_eq!(record.name, "Allow Cortana");
}
