//! Islands - independently hydrated components inside a server page.
//!
//! On the server, [`IslandRegistry::collect`] wraps a render. Every island
//! rendered inside it gets an id, and its props are recorded:
//!
//! ```text
//! <div data-bh-island="0" data-bh-island-key="counter">...</div>
//! payload: [{ "id": 0, "key": "counter", "props": { "start": 3 } }]
//! ```
//!
//! On the client, [`IslandRegistry::hydrate`] finds each wrapper node and
//! mounts the registered component onto it. Every island gets its own
//! runtime (the wrapper is its root), so islands never share hook state with
//! the page or with each other.
//!
//! ```ignore
//! let islands = IslandRegistry::new();
//! let counter = islands.define(counter, IslandOptions::default())?;
//!
//! // server
//! let page = islands.collect(|| render_to_string(&h("main").child(counter.node(Start(3))).into()));
//! let payload = serialize_islands(&page.islands)?;
//!
//! // client
//! let report = islands.hydrate(&document, HydrateOptions::default());
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::dom::{Document, NodeRef};
use crate::error::{RenderError, Result};
use crate::pipeline::mount;
use crate::types::Props;
use crate::vnode::{fn_name, Child, Component, NodeBuilder, NodeKind, VNode};

use super::serialize_state;

/// Page global holding the island payload.
pub const DEFAULT_ISLANDS_KEY: &str = "__BH_ISLANDS__";
pub const ISLAND_ID_ATTR: &str = "data-bh-island";
pub const ISLAND_KEY_ATTR: &str = "data-bh-island-key";

const PROPS_KEY: &str = "props";

/// One rendered island: wrapper id, registry key, serialized props.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IslandPayloadEntry {
    pub id: usize,
    pub key: String,
    pub props: Value,
}

#[derive(Debug, Clone, Default)]
pub struct IslandOptions {
    /// Registry key. Defaults to the component's function name.
    pub key: Option<String>,
    /// Wrapper element, `div` by default.
    pub wrapper_tag: Option<String>,
    /// Extra props for the wrapper element.
    pub wrapper_props: Props,
}

/// Result of [`IslandRegistry::collect`].
#[derive(Debug)]
pub struct Collected<T> {
    pub result: T,
    pub islands: Vec<IslandPayloadEntry>,
}

#[derive(Default)]
struct Collector {
    entries: Vec<IslandPayloadEntry>,
    next_id: usize,
}

type Hydrator = Rc<dyn Fn(Value) -> Result<Child>>;

#[derive(Default)]
struct RegistryInner {
    hydrators: RefCell<IndexMap<String, Hydrator>>,
    anonymous: Cell<usize>,
    collector: RefCell<Option<Collector>>,
}

/// Island components by key, plus the active collection (if any).
#[derive(Clone, Default)]
pub struct IslandRegistry(Rc<RegistryInner>);

impl fmt::Debug for IslandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IslandRegistry")
            .field("keys", &self.keys())
            .field("collecting", &self.0.collector.borrow().is_some())
            .finish()
    }
}

impl IslandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.hydrators.borrow().keys().cloned().collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.hydrators.borrow().contains_key(key)
    }

    fn resolve_key<F>(&self, requested: Option<&str>) -> String {
        if let Some(key) = requested.map(str::trim).filter(|k| !k.is_empty()) {
            return key.to_string();
        }
        if let Some(name) = fn_name::<F>() {
            return name.to_string();
        }
        let n = self.0.anonymous.get() + 1;
        self.0.anonymous.set(n);
        format!("island-{n}")
    }

    /// Register `render` as an island.
    pub fn define<P, F>(&self, render: F, options: IslandOptions) -> Result<Island<P>>
    where
        P: Serialize + DeserializeOwned + Clone + 'static,
        F: Fn(&P) -> Result<Child> + 'static,
    {
        let key: Rc<str> = self.resolve_key::<F>(options.key.as_deref()).into();
        if self.contains(&key) {
            return Err(RenderError::DuplicateIsland(key.to_string()));
        }

        let component = Component::named(key.clone(), move |props: &Props| {
            let island_props = props
                .data::<P>(PROPS_KEY)
                .ok_or_else(|| RenderError::component("island rendered without its props"))?;
            render(island_props.as_ref())
        });

        let hydrate_with = component.clone();
        let hydrator: Hydrator = Rc::new(move |value: Value| -> Result<Child> {
            let props: P = serde_json::from_value(value)?;
            Ok(island_body(&hydrate_with, props).into())
        });
        self.0.hydrators.borrow_mut().insert(key.to_string(), hydrator);
        debug!(key = %key, "island defined");

        Ok(Island {
            key,
            component,
            wrapper_tag: options.wrapper_tag.unwrap_or_else(|| "div".to_string()).into(),
            wrapper_props: options.wrapper_props,
            registry: self.clone(),
            _props: PhantomData,
        })
    }

    /// Run `render` with island recording on. Ids start at 0. The previous
    /// collection (if this one is nested) is restored afterwards.
    pub fn collect<T>(&self, render: impl FnOnce() -> T) -> Collected<T> {
        let previous = self.0.collector.borrow_mut().replace(Collector::default());
        let restore = RestoreCollector {
            registry: self,
            previous: Some(previous),
        };

        let result = render();
        let islands = restore.finish();
        Collected { result, islands }
    }

    /// Record one island render. `None` outside a collection.
    fn record(&self, key: &str, props: Value) -> Option<usize> {
        let mut collector = self.0.collector.borrow_mut();
        let collector = collector.as_mut()?;
        let id = collector.next_id;
        collector.next_id += 1;
        collector.entries.push(IslandPayloadEntry {
            id,
            key: key.to_string(),
            props,
        });
        Some(id)
    }

    /// Mount every island of the payload onto its server-rendered wrapper.
    ///
    /// Failures are reported, not raised. Wrappers missing from the page are
    /// skipped.
    pub fn hydrate(&self, document: &Document, options: HydrateOptions) -> HydrationReport {
        let mut report = HydrationReport::default();
        let state_key = options.state_key.as_deref().unwrap_or(DEFAULT_ISLANDS_KEY);
        let payload = match options.payload {
            Some(payload) => payload,
            None => read_payload(document, state_key, &mut report),
        };

        for entry in payload {
            let selector = format!("[{ISLAND_ID_ATTR}=\"{}\"]", entry.id);
            let target = match &options.root {
                Some(root) => root.query_selector(&selector),
                None => document.query_selector(&selector),
            };
            let Some(target) = target else {
                warn!(id = entry.id, key = %entry.key, "island wrapper not found, skipping");
                report.skipped.push(entry.id);
                continue;
            };

            match self.hydrate_one(&target, &entry) {
                Ok(()) => report.hydrated.push(entry.id),
                Err(error) => {
                    warn!(id = entry.id, key = %entry.key, %error, "island hydration failed");
                    report.errors.push(IslandError {
                        id: Some(entry.id),
                        key: entry.key.clone(),
                        error,
                    });
                }
            }
        }
        report
    }

    fn hydrate_one(&self, target: &NodeRef, entry: &IslandPayloadEntry) -> Result<()> {
        let hydrator = self
            .0
            .hydrators
            .borrow()
            .get(&entry.key)
            .cloned()
            .ok_or_else(|| RenderError::UnknownIsland(entry.key.clone()))?;

        let tree = hydrator(entry.props.clone())?;
        mount(target, tree)?;
        Ok(())
    }
}

fn read_payload(document: &Document, state_key: &str, report: &mut HydrationReport) -> Vec<IslandPayloadEntry> {
    match document.global(state_key) {
        Some(value @ Value::Array(_)) => serde_json::from_value(value).unwrap_or_else(|error| {
            warn!(state_key, %error, "malformed island payload");
            report.errors.push(IslandError {
                id: None,
                key: state_key.to_string(),
                error: RenderError::Json(error),
            });
            Vec::new()
        }),
        _ => Vec::new(),
    }
}

/// Puts the outer collector back even if the render panics.
struct RestoreCollector<'a> {
    registry: &'a IslandRegistry,
    previous: Option<Option<Collector>>,
}

impl RestoreCollector<'_> {
    fn finish(mut self) -> Vec<IslandPayloadEntry> {
        let previous = self.previous.take().flatten();
        let current = std::mem::replace(&mut *self.registry.0.collector.borrow_mut(), previous);
        current.map(|c| c.entries).unwrap_or_default()
    }
}

impl Drop for RestoreCollector<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            *self.registry.0.collector.borrow_mut() = previous;
        }
    }
}

/// Serialize a payload for embedding in the page.
pub fn serialize_islands(payload: &[IslandPayloadEntry]) -> Result<String> {
    serialize_state(&payload)
}

// =============================================================================
// Island handle
// =============================================================================

/// A registered island. [`Island::node`] places it in a tree.
pub struct Island<P> {
    key: Rc<str>,
    component: Component,
    wrapper_tag: Rc<str>,
    wrapper_props: Props,
    registry: IslandRegistry,
    _props: PhantomData<fn(P)>,
}

impl<P> Clone for Island<P> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            component: self.component.clone(),
            wrapper_tag: self.wrapper_tag.clone(),
            wrapper_props: self.wrapper_props.clone(),
            registry: self.registry.clone(),
            _props: PhantomData,
        }
    }
}

impl<P> fmt::Debug for Island<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Island").field("key", &self.key).finish()
    }
}

fn island_body<P: 'static>(component: &Component, props: P) -> VNode {
    NodeBuilder::new(NodeKind::Component(component.clone()))
        .data(PROPS_KEY, props)
        .build()
}

impl<P> Island<P>
where
    P: Serialize + DeserializeOwned + Clone + 'static,
{
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Tree node for this island. Inside [`IslandRegistry::collect`] it
    /// renders as a marked wrapper and records its props; elsewhere it is
    /// the bare component.
    pub fn node(&self, props: P) -> VNode {
        let island = self.clone();
        let marker = Component::named(format!("island:{}", self.key), move |_: &Props| {
            let body = island_body(&island.component, props.clone());
            let Some(id) = island.registry.record(&island.key, serde_json::to_value(&props)?) else {
                return Ok(body.into());
            };

            let mut wrapper = NodeBuilder::new(NodeKind::Element(island.wrapper_tag.clone()));
            for (name, value) in island.wrapper_props.iter() {
                wrapper = wrapper.prop(name, value.clone());
            }
            Ok(wrapper
                .prop(ISLAND_ID_ATTR, id.to_string())
                .prop(ISLAND_KEY_ATTR, &*island.key)
                .child(body)
                .into())
        });

        NodeBuilder::new(NodeKind::Component(marker)).build()
    }
}

// =============================================================================
// Hydration
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct HydrateOptions {
    /// Page global to read the payload from (`__BH_ISLANDS__`).
    pub state_key: Option<String>,
    /// Search root for wrappers, the whole document by default.
    pub root: Option<NodeRef>,
    /// Use this payload instead of reading the page global.
    pub payload: Option<Vec<IslandPayloadEntry>>,
}

#[derive(Debug)]
pub struct IslandError {
    /// `None` when the payload itself could not be read.
    pub id: Option<usize>,
    pub key: String,
    pub error: RenderError,
}

#[derive(Debug, Default)]
pub struct HydrationReport {
    pub hydrated: Vec<usize>,
    pub skipped: Vec<usize>,
    pub errors: Vec<IslandError>,
}

impl HydrationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::render_to_string;
    use crate::vnode::h;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Label {
        text: String,
    }

    fn label(props: &Label) -> Result<Child> {
        Ok(h("span").child(props.text.clone()).into())
    }

    #[test]
    fn test_key_resolution() {
        let islands = IslandRegistry::new();
        let named = islands.define(label, IslandOptions::default());
        assert_eq!(named.unwrap().key(), "label");

        let explicit = islands.define(
            |_: &Label| Ok(Child::Empty),
            IslandOptions {
                key: Some("  banner ".into()),
                ..Default::default()
            },
        );
        assert_eq!(explicit.unwrap().key(), "banner");

        let anonymous = islands.define(|_: &Label| Ok(Child::Empty), IslandOptions::default());
        assert_eq!(anonymous.unwrap().key(), "island-1");
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let islands = IslandRegistry::new();
        islands.define(label, IslandOptions::default()).unwrap();
        let again = islands.define(label, IslandOptions::default());
        assert!(matches!(again, Err(RenderError::DuplicateIsland(ref key)) if key == "label"));
    }

    #[test]
    fn test_bare_outside_collection() {
        let islands = IslandRegistry::new();
        let island = islands.define(label, IslandOptions::default()).unwrap();

        let html = render_to_string(&island.node(Label { text: "hi".into() }).into()).unwrap();
        assert_eq!(html, "<span>hi</span>");
    }

    #[test]
    fn test_nested_collect_restores_outer() {
        let islands = IslandRegistry::new();
        let island = islands.define(label, IslandOptions::default()).unwrap();

        let outer = islands.collect(|| {
            let first = render_to_string(&island.node(Label { text: "a".into() }).into()).unwrap();
            let inner = islands.collect(|| render_to_string(&island.node(Label { text: "b".into() }).into()));
            let last = render_to_string(&island.node(Label { text: "c".into() }).into()).unwrap();
            (first + &last, inner.islands)
        });

        let (html, inner) = outer.result;
        assert!(html.starts_with("<div") && html.contains("<span>a</span>") && html.contains("<span>c</span>"));
        assert_eq!(inner.len(), 1);
        assert_eq!(inner[0].id, 0);
        let ids: Vec<usize> = outer.islands.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![0, 1]);
        assert_eq!(outer.islands[1].props, serde_json::json!({ "text": "c" }));
    }

    #[test]
    fn test_unknown_and_missing_islands_reported() {
        let islands = IslandRegistry::new();
        let doc = Document::new();
        let wrapper = doc.create_element("div");
        wrapper.set_attribute(ISLAND_ID_ATTR, "0");
        doc.body().append_child(&wrapper).unwrap();

        let report = islands.hydrate(
            &doc,
            HydrateOptions {
                payload: Some(vec![
                    IslandPayloadEntry {
                        id: 0,
                        key: "ghost".into(),
                        props: Value::Null,
                    },
                    IslandPayloadEntry {
                        id: 7,
                        key: "ghost".into(),
                        props: Value::Null,
                    },
                ]),
                ..Default::default()
            },
        );

        assert_eq!(report.skipped, vec![7]);
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(report.errors[0].error, RenderError::UnknownIsland(ref key) if key == "ghost"));
    }
}
