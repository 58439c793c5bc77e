use std::cell::Cell;

use super::NodeRef;

/// An event travelling from its target up through the ancestors.
///
/// Events dispatched in a [`Document`](super::Document) carry their target
/// node. Events coming from a browser (the `web` feature) carry the native
/// event instead, reachable through `native()`.
#[derive(Debug)]
pub struct Event {
    event_type: String,
    target: Option<NodeRef>,
    current_target: Cell<Option<super::NodeId>>,
    propagation_stopped: Cell<bool>,
    #[cfg(feature = "web")]
    native: Option<web_sys::Event>,
}

impl Event {
    pub fn new(event_type: &str, target: NodeRef) -> Self {
        Self {
            event_type: event_type.to_string(),
            target: Some(target),
            current_target: Cell::new(None),
            propagation_stopped: Cell::new(false),
            #[cfg(feature = "web")]
            native: None,
        }
    }

    /// Wrap a browser event.
    #[cfg(feature = "web")]
    pub fn from_native(native: web_sys::Event) -> Self {
        Self {
            event_type: native.type_(),
            target: None,
            current_target: Cell::new(None),
            propagation_stopped: Cell::new(false),
            native: Some(native),
        }
    }

    #[cfg(feature = "web")]
    pub fn native(&self) -> Option<&web_sys::Event> {
        self.native.as_ref()
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Node the event was dispatched on. `None` for browser events.
    pub fn target(&self) -> Option<&NodeRef> {
        self.target.as_ref()
    }

    /// Node whose listener is running.
    pub fn current_target(&self) -> Option<NodeRef> {
        let target = self.target.as_ref()?;
        self.current_target
            .get()
            .map(|id| NodeRef::new(target.document().clone(), id))
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
        #[cfg(feature = "web")]
        if let Some(native) = &self.native {
            native.stop_propagation();
        }
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }

    pub(crate) fn set_current_target(&self, id: super::NodeId) {
        self.current_target.set(Some(id));
    }
}
