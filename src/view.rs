//! The seam between the filter engine and the presentation layer.
//!
//! [ViewProjector::dispatch] is the only way user actions reach the [FilterEngine], and
//! [ViewSink::on_filter_changed] is the only way results leave it. The projector keeps no state of
//! its own beyond the list of subscribers.

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    config::CatalogConfig,
    error::{CatalogError, ErrorKind},
    event::{CatalogEvent, Notification, ViewSnapshot},
    filter::{FilterEngine, FilterState},
    properties::PolicyRecord,
    store::RecordStore,
    tree::CategoryTree,
};

/// A consistent borrowed view of the engine: the pruned tree and the records it was built from.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogView<'a> {
    pub revision: u64,
    pub state: &'a FilterState,
    pub tree: &'a CategoryTree,
    pub records: Vec<&'a PolicyRecord>,
    /// Per-record scores, parallel to `records`, when results are ranked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores: Option<&'a [f32]>,
}

impl<'a> CatalogView<'a> {
    pub fn of(engine: &'a FilterEngine) -> Self {
        CatalogView {
            revision: engine.revision(),
            state: engine.state(),
            tree: engine.tree(),
            records: engine.filtered_records(),
            scores: engine.scores(),
        }
    }

    /// Owned copy of this view. Matches [FilterEngine::snapshot] for the engine it was taken from.
    pub fn to_snapshot(&self) -> ViewSnapshot {
        ViewSnapshot {
            revision: self.revision,
            state: self.state.clone(),
            tree: self.tree.root().clone(),
            records: self.records.iter().map(|record| record.id).collect(),
            scores: self.scores.map(<[f32]>::to_vec),
        }
    }
}

/// Subscriber to view changes.
pub trait ViewSink {
    fn on_filter_changed(&mut self, view: &CatalogView<'_>);
    fn on_error(&mut self, kind: ErrorKind, message: &str);
}

impl ViewSink for UnboundedSender<Notification> {
    fn on_filter_changed(&mut self, view: &CatalogView<'_>) {
        if self
            .send(Notification::FilterChanged(view.to_snapshot()))
            .is_err()
        {
            tracing::debug!("view receiver dropped, revision {} not delivered", view.revision);
        }
    }

    fn on_error(&mut self, kind: ErrorKind, message: &str) {
        let notification = Notification::Error {
            kind,
            message: message.to_string(),
        };
        if self.send(notification).is_err() {
            tracing::debug!("view receiver dropped, {kind} error not delivered");
        }
    }
}

/// Adapts a pair of closures into a [ViewSink].
pub struct FnSink<V, E> {
    on_view: V,
    on_error: E,
}

impl<V, E> FnSink<V, E>
where
    V: FnMut(&CatalogView<'_>),
    E: FnMut(ErrorKind, &str),
{
    pub fn new(on_view: V, on_error: E) -> Self {
        FnSink { on_view, on_error }
    }
}

impl<V, E> ViewSink for FnSink<V, E>
where
    V: FnMut(&CatalogView<'_>),
    E: FnMut(ErrorKind, &str),
{
    fn on_filter_changed(&mut self, view: &CatalogView<'_>) {
        (self.on_view)(view)
    }

    fn on_error(&mut self, kind: ErrorKind, message: &str) {
        (self.on_error)(kind, message)
    }
}

pub struct ViewProjector {
    engine: FilterEngine,
    sinks: Vec<Box<dyn ViewSink>>,
}

impl ViewProjector {
    pub fn new(engine: FilterEngine) -> Self {
        ViewProjector {
            engine,
            sinks: Vec::new(),
        }
    }

    /// Load `data` and build a projector over it. On failure every sink is told through
    /// [ViewSink::on_error] before the error is returned.
    pub fn from_json(
        data: &str,
        config: &CatalogConfig,
        mut sinks: Vec<Box<dyn ViewSink>>,
    ) -> Result<Self, CatalogError> {
        match RecordStore::from_json(data, config) {
            Ok(store) => {
                let mut projector = ViewProjector::new(FilterEngine::new(store, config));
                for sink in sinks {
                    projector.subscribe(sink);
                }
                Ok(projector)
            }
            Err(err) => {
                tracing::error!("Failed to load policy catalog: {err}");
                let message = err.to_string();
                for sink in sinks.iter_mut() {
                    sink.on_error(err.kind(), &message);
                }
                Err(err)
            }
        }
    }

    /// Register `sink`. It immediately receives the current view so it can render the initial
    /// state.
    pub fn subscribe(&mut self, mut sink: Box<dyn ViewSink>) {
        sink.on_filter_changed(&CatalogView::of(&self.engine));
        self.sinks.push(sink);
    }

    /// Apply `event` and notify every sink. Failed events are reported through
    /// [ViewSink::on_error] and do not produce a view.
    pub fn dispatch(&mut self, event: CatalogEvent) -> Result<u64, CatalogError> {
        tracing::debug!("dispatch {event}");
        match self.engine.apply(&event) {
            Ok(revision) => {
                let view = CatalogView::of(&self.engine);
                for sink in self.sinks.iter_mut() {
                    sink.on_filter_changed(&view);
                }
                Ok(revision)
            }
            Err(err) => {
                let message = err.to_string();
                for sink in self.sinks.iter_mut() {
                    sink.on_error(err.kind(), &message);
                }
                Err(err)
            }
        }
    }

    pub fn view(&self) -> CatalogView<'_> {
        CatalogView::of(&self.engine)
    }

    pub fn engine(&self) -> &FilterEngine {
        &self.engine
    }

    pub fn subscriber_count(&self) -> usize {
        self.sinks.len()
    }
}
