//! Active hook frame - which component the hooks being called belong to.
//!
//! The runtime enters a frame right before calling a component function and
//! leaves it right after. Hooks claim the next slot index from the frame.
//! Frames nest: entering saves the previous frame and leaving restores it,
//! even when the component returns `Err` or panics.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{RenderError, Result};

use super::runtime::{Runtime, WeakRuntime};
use super::store::{HookKind, HookStore, Slot};

struct HookFrame {
    runtime: Runtime,
    path: Rc<str>,
    store: u64,
    index: usize,
}

thread_local! {
    static ACTIVE_FRAME: RefCell<Option<HookFrame>> = const { RefCell::new(None) };
}

/// Restores the previous frame on drop.
pub(crate) struct FrameGuard {
    previous: Option<HookFrame>,
}

impl FrameGuard {
    /// Number of hooks called in this frame so far.
    pub fn hooks_called(&self) -> usize {
        ACTIVE_FRAME.with(|active| active.borrow().as_ref().map_or(0, |frame| frame.index))
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        ACTIVE_FRAME.with(|active| *active.borrow_mut() = previous);
    }
}

/// Make store `store` at `path` of `runtime` the current hook target with
/// index 0.
pub(crate) fn enter(runtime: Runtime, path: Rc<str>, store: u64) -> FrameGuard {
    let frame = HookFrame {
        runtime,
        path,
        store,
        index: 0,
    };
    let previous = ACTIVE_FRAME.with(|active| active.borrow_mut().replace(frame));
    FrameGuard { previous }
}

/// Claim the next slot of the active frame for a hook of `kind`.
pub(crate) fn next_slot(kind: HookKind) -> Result<SlotRef> {
    let claimed = ACTIVE_FRAME.with(|active| {
        let mut active = active.borrow_mut();
        let frame = active.as_mut()?;
        let index = frame.index;
        frame.index += 1;
        Some((frame.runtime.clone(), frame.path.clone(), frame.store, index))
    });

    let (runtime, path, store, index) = claimed.ok_or(RenderError::HookOutsideComponent { hook: kind.name() })?;
    runtime.claim_slot(&path, index, kind)?;

    Ok(SlotRef {
        runtime,
        path,
        store,
        index,
        kind,
    })
}

// =============================================================================
// Slot handles
// =============================================================================

/// Strong handle to one hook slot.
#[derive(Clone)]
pub(crate) struct SlotRef {
    pub runtime: Runtime,
    pub path: Rc<str>,
    /// Id of the store the slot was claimed in.
    pub store: u64,
    pub index: usize,
    pub kind: HookKind,
}

impl SlotRef {
    fn slot_type_error(&self) -> RenderError {
        RenderError::SlotType {
            path: self.path.to_string(),
            index: self.index,
            hook: self.kind.name(),
        }
    }

    /// Run `f` against the owning store. `None` when the store is gone or
    /// was replaced by another component's store at the same path.
    pub fn with_store<R>(&self, f: impl FnOnce(&mut HookStore, usize) -> R) -> Option<R> {
        self.runtime
            .with_store(&self.path, |store| (store.id() == self.store).then(|| f(store, self.index)))
            .flatten()
    }

    /// Read the slot's value.
    ///
    /// `Ok(None)` when the slot (or its store) does not exist yet, `Err` when
    /// it holds another type.
    pub fn read<S: 'static, R>(&self, f: impl FnOnce(&S) -> R) -> Result<Option<R>> {
        let outcome = self.with_store(|store, index| match store.slot(index) {
            None | Some(Slot::Vacant) => Ok(None),
            Some(Slot::Value(value)) => value
                .downcast_ref::<S>()
                .map(|typed| Some(f(typed)))
                .ok_or(()),
            Some(Slot::Effect(_)) => Err(()),
        });

        match outcome {
            None => Ok(None),
            Some(Ok(value)) => Ok(value),
            Some(Err(())) => Err(self.slot_type_error()),
        }
    }

    /// Mutate the slot's value in place. Same `None`/`Err` rules as `read`.
    pub fn update<S: 'static, R>(&self, f: impl FnOnce(&mut S) -> R) -> Result<Option<R>> {
        let outcome = self.with_store(|store, index| match store.slot_mut(index) {
            None | Some(Slot::Vacant) => Ok(None),
            Some(Slot::Value(value)) => value
                .downcast_mut::<S>()
                .map(|typed| Some(f(typed)))
                .ok_or(()),
            Some(Slot::Effect(_)) => Err(()),
        });

        match outcome {
            None => Ok(None),
            Some(Ok(value)) => Ok(value),
            Some(Err(())) => Err(self.slot_type_error()),
        }
    }

    /// Store a value in the slot.
    pub fn write<S: 'static>(&self, value: S) {
        let boxed: Box<dyn Any> = Box::new(value);
        self.with_store(move |store, index| store.put(index, Slot::Value(boxed)));
    }

    pub fn downgrade(&self) -> WeakSlot {
        WeakSlot {
            runtime: self.runtime.downgrade(),
            path: self.path.clone(),
            store: self.store,
            index: self.index,
            kind: self.kind,
        }
    }
}

/// Weak handle kept by setters and dispatchers after the render is over.
#[derive(Clone)]
pub(crate) struct WeakSlot {
    runtime: WeakRuntime,
    path: Rc<str>,
    store: u64,
    index: usize,
    kind: HookKind,
}

impl WeakSlot {
    pub fn upgrade(&self) -> Option<SlotRef> {
        Some(SlotRef {
            runtime: self.runtime.upgrade()?,
            path: self.path.clone(),
            store: self.store,
            index: self.index,
            kind: self.kind,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl PartialEq for WeakSlot {
    fn eq(&self, other: &Self) -> bool {
        self.runtime.ptr_eq(&other.runtime)
            && self.path == other.path
            && self.store == other.store
            && self.index == other.index
    }
}
