//! Hook Store - per-path slot arena.
//!
//! Each component position (path) owns one store. Slots are addressed by
//! hook call order inside that component, so the nth hook call of every
//! render lands in slot n:
//!
//! ```text
//! "0.0.1" -> [ State(count), Memo(total), Effect(title), Ref(el) ]
//! ```
//!
//! Setters and dispatchers keep `(path, index)` instead of a pointer to the
//! slot, so a slot can only be reached through the store that owns it.

use std::any::Any;

use crate::error::Result;
use crate::vnode::ComponentKey;

/// Cleanup returned by an effect. Runs before the effect's next run and when
/// the owning component leaves the tree.
pub type Cleanup = Box<dyn FnOnce()>;

/// Effect body as stored in a slot.
pub(crate) type EffectFn = Box<dyn FnOnce() -> Result<Option<Cleanup>>>;

/// Which hook owns a slot. Recorded on the first render for order checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HookKind {
    State,
    Reducer,
    Memo,
    Ref,
    Context,
    Effect,
}

impl HookKind {
    pub(crate) fn name(self) -> &'static str {
        match self {
            HookKind::State => "use_state",
            HookKind::Reducer => "use_reducer",
            HookKind::Memo => "use_memo",
            HookKind::Ref => "use_ref",
            HookKind::Context => "use_context",
            HookKind::Effect => "use_effect",
        }
    }
}

/// Effect slot: the deps snapshot, the pending body and the live cleanup.
pub(crate) struct EffectEntry {
    pub deps: Option<Box<dyn Any>>,
    pub effect: Option<EffectFn>,
    pub cleanup: Option<Cleanup>,
}

pub(crate) enum Slot {
    /// Claimed but not written yet (context reads never write).
    Vacant,
    Value(Box<dyn Any>),
    Effect(EffectEntry),
}

#[derive(Default)]
pub(crate) struct HookStore {
    /// Unique per store, so handles into a replaced store go inert.
    id: u64,
    /// Component that created the store.
    owner: Option<ComponentKey>,
    slots: Vec<Slot>,
    /// Hook kind per call index.
    kinds: Vec<HookKind>,
    /// Set after the first render that ran to completion.
    rendered: bool,
}

impl HookStore {
    pub fn new(id: u64, owner: ComponentKey) -> Self {
        Self {
            id,
            owner: Some(owner),
            ..Default::default()
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_owned_by(&self, owner: &ComponentKey) -> bool {
        self.owner.as_ref() == Some(owner)
    }

    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut Slot> {
        self.slots.get_mut(index)
    }

    /// Write a slot, padding with vacant slots if needed.
    pub fn put(&mut self, index: usize, slot: Slot) {
        while self.slots.len() < index {
            self.slots.push(Slot::Vacant);
        }
        if index == self.slots.len() {
            self.slots.push(slot);
        } else {
            self.slots[index] = slot;
        }
    }

    pub fn kinds(&self) -> &[HookKind] {
        &self.kinds
    }

    pub fn record_kind(&mut self, index: usize, kind: HookKind) {
        if index == self.kinds.len() {
            self.kinds.push(kind);
        }
    }

    pub fn is_rendered(&self) -> bool {
        self.rendered
    }

    /// Mark a completed render that called `hooks` hooks.
    pub fn seal(&mut self, hooks: usize) {
        if !self.rendered {
            self.kinds.truncate(hooks);
            self.rendered = true;
        }
    }

    /// Take every live effect cleanup, in slot order.
    pub fn take_cleanups(&mut self) -> Vec<Cleanup> {
        self.slots
            .iter_mut()
            .filter_map(|slot| match slot {
                Slot::Effect(entry) => entry.cleanup.take(),
                _ => None,
            })
            .collect()
    }
}

/// Shallow deps comparison: `true` when `next` differs from the snapshot.
///
/// No snapshot, or a snapshot of another type, counts as changed.
pub(crate) fn deps_changed<D: PartialEq + 'static>(previous: Option<&dyn Any>, next: &D) -> bool {
    match previous.and_then(|prev| prev.downcast_ref::<D>()) {
        Some(prev) => prev != next,
        None => true,
    }
}
