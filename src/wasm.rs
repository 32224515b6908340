//! WASM bindings for policy-catalog
//!
//! This module exposes the catalog session to JavaScript. A page loads the policy payload, builds a
//! [CatalogWasm], subscribes a render callback, and forwards user actions.
//!
//! ## Usage
//!
//! ```javascript,ignore
//! import init, { CatalogWasm } from './policy_catalog.js';
//!
//! async function main() {
//!     await init();
//!
//!     const response = await fetch('policies.json');
//!     const catalog = new CatalogWasm(await response.text(), 'match_mode = "fuzzy"');
//!
//!     catalog.subscribe(
//!         (view) => render(view.tree, view.records),
//!         (kind, message) => console.warn(kind, message),
//!     );
//!
//!     input.addEventListener('input', (e) => catalog.pushQuery(e.target.value, performance.now()));
//!     setInterval(() => catalog.pollQuery(performance.now()), 50);
//!
//!     catalog.toggleTag('User');
//!     catalog.selectNode(['Windows Components', 'Microsoft Edge']);
//! }
//! ```
//!
//! ## Serialization
//!
//! Every value handed to JavaScript goes through [serde_wasm_bindgen::Serializer::json_compatible],
//! so `BTreeMap`s (tree children, nav nodes, pass-through attributes) arrive as plain objects rather
//! than `Map`s. `Object.keys(view.tree.children)` and `view.tree.children[segment]` both work.
//!
//! ## Re-entrancy
//!
//! Subscriber callbacks run while the catalog is dispatching. Calling back into the catalog from
//! inside a callback fails with a `Busy` error instead of panicking; schedule the call instead
//! (e.g. `queueMicrotask`).

use std::{cell::RefCell, str::FromStr, sync::Once};

use js_sys::Function;
use serde::Serialize;
use wasm_bindgen::prelude::*;
use web_sys::console;

use crate::{
    config::CatalogConfig,
    debounce::QueryDebouncer,
    error::{CatalogError, ErrorKind},
    event::CatalogEvent,
    properties::{CategoryPath, PolicyClass, RecordId},
    view::{CatalogView, ViewProjector, ViewSink},
};

static TRACING: Once = Once::new();

fn install_tracing() {
    TRACING.call_once(|| {
        if tracing_wasm::try_set_as_global_default().is_err() {
            console::warn_1(&"⚠️ A global tracing subscriber is already installed".into());
        }
    });
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, CatalogError> {
    Ok(value.serialize(&serde_wasm_bindgen::Serializer::json_compatible())?)
}

fn js_error(err: CatalogError) -> JsValue {
    let msg = format!("❌ {err}");
    console::error_1(&msg.clone().into());
    JsValue::from_str(&msg)
}

/// Forwards views and errors to JavaScript callbacks.
struct JsSink {
    on_view: Function,
    on_error: Option<Function>,
}

impl ViewSink for JsSink {
    fn on_filter_changed(&mut self, view: &CatalogView<'_>) {
        let value = match to_js(view) {
            Ok(value) => value,
            Err(e) => {
                console::error_1(&format!("❌ Failed to serialize view: {e}").into());
                return;
            }
        };
        if let Err(e) = self.on_view.call1(&JsValue::NULL, &value) {
            console::error_1(&"❌ View callback threw".into());
            console::error_1(&e);
        }
    }

    fn on_error(&mut self, kind: ErrorKind, message: &str) {
        match &self.on_error {
            Some(callback) => {
                let kind = JsValue::from_str(&kind.to_string());
                if let Err(e) = callback.call2(&JsValue::NULL, &kind, &JsValue::from_str(message)) {
                    console::error_1(&"❌ Error callback threw".into());
                    console::error_1(&e);
                }
            }
            None => console::warn_1(&format!("⚠️ {kind}: {message}").into()),
        }
    }
}

#[wasm_bindgen]
pub struct CatalogWasm {
    inner: RefCell<ViewProjector>,
    debouncer: RefCell<QueryDebouncer>,
    separator: String,
}

impl CatalogWasm {
    fn dispatch(&self, event: CatalogEvent) -> Result<f64, JsValue> {
        let mut inner = self
            .inner
            .try_borrow_mut()
            .map_err(|_| js_error(CatalogError::Busy))?;
        inner
            .dispatch(event)
            .map(|revision| revision as f64)
            .map_err(js_error)
    }
}

#[wasm_bindgen]
impl CatalogWasm {
    /// Load a policy payload (a JSON array of records) with an optional TOML config.
    ///
    /// # JavaScript Example
    /// ```javascript,ignore
    /// const catalog = new CatalogWasm(json, null);
    /// ```
    #[wasm_bindgen(constructor)]
    pub fn new(data: String, config_toml: Option<String>) -> Result<CatalogWasm, JsValue> {
        install_tracing();

        let config = match config_toml.as_deref() {
            Some(toml) => CatalogConfig::from_toml_str(toml).map_err(js_error)?,
            None => CatalogConfig::default(),
        };
        let projector = ViewProjector::from_json(&data, &config, Vec::new()).map_err(js_error)?;

        let report = projector.engine().store().report();
        console::log_1(
            &format!(
                "✅ Loaded policy catalog: {} records, {} rejected",
                report.accepted,
                report.rejected.len()
            )
            .into(),
        );

        Ok(CatalogWasm {
            inner: RefCell::new(projector),
            debouncer: RefCell::new(QueryDebouncer::from_config(&config)),
            separator: config.path_separator,
        })
    }

    /// Replace the query text immediately. Returns the new revision.
    #[wasm_bindgen(js_name = setQuery)]
    pub fn set_query(&self, text: String) -> Result<f64, JsValue> {
        self.debouncer.borrow_mut().flush();
        self.dispatch(CatalogEvent::SetQuery(text))
    }

    /// Record a query edit without applying it. Call [CatalogWasm::poll_query] from a timer to
    /// apply the last edit once typing pauses.
    #[wasm_bindgen(js_name = pushQuery)]
    pub fn push_query(&self, text: String, now_ms: f64) {
        self.debouncer.borrow_mut().push(text, now_ms.max(0.0) as u64);
    }

    /// Apply the pending query edit if the debounce window has passed. Returns whether a query was
    /// applied.
    #[wasm_bindgen(js_name = pollQuery)]
    pub fn poll_query(&self, now_ms: f64) -> Result<bool, JsValue> {
        let released = self.debouncer.borrow_mut().poll(now_ms.max(0.0) as u64);
        match released {
            Some(text) => self.dispatch(CatalogEvent::SetQuery(text)).map(|_| true),
            None => Ok(false),
        }
    }

    /// Apply the pending query edit now, if there is one.
    #[wasm_bindgen(js_name = flushQuery)]
    pub fn flush_query(&self) -> Result<bool, JsValue> {
        let released = self.debouncer.borrow_mut().flush();
        match released {
            Some(text) => self.dispatch(CatalogEvent::SetQuery(text)).map(|_| true),
            None => Ok(false),
        }
    }

    /// Toggle one of `"Machine"`, `"User"`, or `"Both"` (case-insensitive).
    #[wasm_bindgen(js_name = toggleTag)]
    pub fn toggle_tag(&self, tag: String) -> Result<f64, JsValue> {
        let tag = PolicyClass::from_str(&tag).map_err(js_error)?;
        self.dispatch(CatalogEvent::ToggleTag(tag))
    }

    /// Pin the results to a node, given as an array of path segments.
    #[wasm_bindgen(js_name = selectNode)]
    pub fn select_node(&self, segments: JsValue) -> Result<f64, JsValue> {
        let segments: Vec<String> = serde_wasm_bindgen::from_value(segments)
            .map_err(|e| js_error(CatalogError::from(e)))?;
        self.dispatch(CatalogEvent::SelectNode(CategoryPath::new(segments)))
    }

    #[wasm_bindgen(js_name = clearSelection)]
    pub fn clear_selection(&self) -> Result<f64, JsValue> {
        self.dispatch(CatalogEvent::ClearSelection)
    }

    #[wasm_bindgen(js_name = resetFilters)]
    pub fn reset_filters(&self) -> Result<f64, JsValue> {
        self.debouncer.borrow_mut().flush();
        self.dispatch(CatalogEvent::ResetFilters)
    }

    /// The current view: `{ revision, state, tree, records, scores? }`.
    #[wasm_bindgen]
    pub fn view(&self) -> Result<JsValue, JsValue> {
        let inner = self
            .inner
            .try_borrow()
            .map_err(|_| js_error(CatalogError::Busy))?;
        to_js(&inner.view()).map_err(js_error)
    }

    /// The current pruned tree as `{ nodes, roots }`. Nodes are keyed by `JSON.stringify(path)` and
    /// carry a `title` rendered with the configured separator.
    #[wasm_bindgen(js_name = navTree)]
    pub fn nav_tree(&self) -> Result<JsValue, JsValue> {
        let inner = self
            .inner
            .try_borrow()
            .map_err(|_| js_error(CatalogError::Busy))?;
        let nav = inner.engine().tree().nav_tree(&self.separator);
        to_js(&nav).map_err(js_error)
    }

    /// Look up a record by id. Returns `null` for unknown or malformed ids.
    #[wasm_bindgen(js_name = getRecord)]
    pub fn get_record(&self, id: String) -> JsValue {
        let record_id = match RecordId::try_from(id.as_str()) {
            Ok(record_id) => record_id,
            Err(_) => {
                console::warn_1(&format!("⚠️ Invalid record id format: {id}").into());
                return JsValue::NULL;
            }
        };
        let Ok(inner) = self.inner.try_borrow() else {
            return JsValue::NULL;
        };
        match inner.engine().store().get(&record_id) {
            Ok(record) => to_js(record).unwrap_or(JsValue::NULL),
            Err(_) => {
                console::warn_1(&format!("⚠️ Record not found: {id}").into());
                JsValue::NULL
            }
        }
    }

    #[wasm_bindgen(js_name = recordCount)]
    pub fn record_count(&self) -> usize {
        self.inner
            .try_borrow()
            .map(|inner| inner.engine().store().len())
            .unwrap_or_default()
    }

    /// `{ accepted, rejected: [{ index, name, reason }] }` from the load.
    #[wasm_bindgen(js_name = loadReport)]
    pub fn load_report(&self) -> Result<JsValue, JsValue> {
        let inner = self
            .inner
            .try_borrow()
            .map_err(|_| js_error(CatalogError::Busy))?;
        to_js(inner.engine().store().report()).map_err(js_error)
    }

    /// Register `onView(view)` and optionally `onError(kind, message)`. `onView` is called right
    /// away with the current view, then after every change.
    #[wasm_bindgen]
    pub fn subscribe(&self, on_view: Function, on_error: Option<Function>) -> Result<(), JsValue> {
        let mut inner = self
            .inner
            .try_borrow_mut()
            .map_err(|_| js_error(CatalogError::Busy))?;
        inner.subscribe(Box::new(JsSink { on_view, on_error }));
        Ok(())
    }

    #[wasm_bindgen(getter, js_name = debounceMs)]
    pub fn debounce_ms(&self) -> f64 {
        self.debouncer.borrow().window_ms() as f64
    }
}
