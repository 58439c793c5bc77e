//! State hooks: `use_state` and `use_reducer`.

use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::engine::frame::{self, SlotRef, WeakSlot};
use crate::engine::store::HookKind;
use crate::error::Result;

// =============================================================================
// use_state
// =============================================================================

/// Setter returned by [`use_state`]. Stable across renders of the same
/// component: two setters for the same slot compare equal.
pub struct StateSetter<T> {
    slot: WeakSlot,
    _value: PhantomData<fn(T)>,
}

impl<T> Clone for StateSetter<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
            _value: PhantomData,
        }
    }
}

impl<T> PartialEq for StateSetter<T> {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot
    }
}

impl<T> fmt::Debug for StateSetter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateSetter")
            .field("path", &self.slot.path())
            .field("slot", &self.slot.index())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> StateSetter<T> {
    /// Replace the value. Equal values are ignored; anything else schedules a
    /// re-render (which, for a mounted root, has committed when this returns).
    pub fn set(&self, value: T) -> Result<()> {
        let Some(slot) = self.slot.upgrade() else {
            return Ok(());
        };
        let changed = slot.update(|current: &mut T| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        })?;

        if changed == Some(true) {
            slot.runtime.schedule_render()?;
        }
        Ok(())
    }

    /// Compute the next value from the current one.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> Result<()> {
        let Some(slot) = self.slot.upgrade() else {
            return Ok(());
        };
        let Some(current) = slot.read(|value: &T| value.clone())? else {
            return Ok(());
        };
        self.set(f(&current))
    }
}

/// Local state, initialised with `initial` on the first render.
pub fn use_state<T>(initial: T) -> Result<(T, StateSetter<T>)>
where
    T: Clone + PartialEq + 'static,
{
    use_state_with(move || initial)
}

/// Local state with a lazy initializer (only called on the first render).
pub fn use_state_with<T, F>(init: F) -> Result<(T, StateSetter<T>)>
where
    T: Clone + PartialEq + 'static,
    F: FnOnce() -> T,
{
    let slot = frame::next_slot(HookKind::State)?;
    let value = read_or_init(&slot, init)?;
    let setter = StateSetter {
        slot: slot.downgrade(),
        _value: PhantomData,
    };
    Ok((value, setter))
}

fn read_or_init<T: Clone + 'static>(slot: &SlotRef, init: impl FnOnce() -> T) -> Result<T> {
    if let Some(value) = slot.read(|value: &T| value.clone())? {
        return Ok(value);
    }
    let value = init();
    slot.write(value.clone());
    Ok(value)
}

// =============================================================================
// use_reducer
// =============================================================================

type Reducer<S, A> = Rc<dyn Fn(&S, A) -> S>;

struct ReducerSlot<S, A> {
    state: S,
    reducer: Reducer<S, A>,
}

/// Dispatcher returned by [`use_reducer`]. Stable across renders.
pub struct Dispatch<S, A> {
    slot: WeakSlot,
    _types: PhantomData<fn(A) -> S>,
}

impl<S, A> Clone for Dispatch<S, A> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
            _types: PhantomData,
        }
    }
}

impl<S, A> PartialEq for Dispatch<S, A> {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot
    }
}

impl<S, A> fmt::Debug for Dispatch<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatch")
            .field("path", &self.slot.path())
            .field("slot", &self.slot.index())
            .finish()
    }
}

impl<S, A> Dispatch<S, A>
where
    S: Clone + PartialEq + 'static,
    A: 'static,
{
    /// Run the latest reducer against the current state.
    pub fn dispatch(&self, action: A) -> Result<()> {
        let Some(slot) = self.slot.upgrade() else {
            return Ok(());
        };
        let current = slot.read(|entry: &ReducerSlot<S, A>| (entry.state.clone(), entry.reducer.clone()))?;
        let Some((state, reducer)) = current else {
            return Ok(());
        };

        let next = reducer(&state, action);
        if next == state {
            return Ok(());
        }

        slot.update(|entry: &mut ReducerSlot<S, A>| entry.state = next)?;
        slot.runtime.schedule_render()
    }
}

/// Reducer-driven state.
pub fn use_reducer<S, A, R>(reducer: R, initial: S) -> Result<(S, Dispatch<S, A>)>
where
    S: Clone + PartialEq + 'static,
    A: 'static,
    R: Fn(&S, A) -> S + 'static,
{
    use_reducer_with_init(reducer, initial, |state| state)
}

/// Reducer-driven state whose initial value is `init(initial_arg)`.
pub fn use_reducer_with_init<S, A, I, R, F>(reducer: R, initial_arg: I, init: F) -> Result<(S, Dispatch<S, A>)>
where
    S: Clone + PartialEq + 'static,
    A: 'static,
    R: Fn(&S, A) -> S + 'static,
    F: FnOnce(I) -> S,
{
    let slot = frame::next_slot(HookKind::Reducer)?;
    let reducer: Reducer<S, A> = Rc::new(reducer);

    // Keep the newest reducer so dispatchers from older renders use it
    let existing = slot.update(|entry: &mut ReducerSlot<S, A>| {
        entry.reducer = reducer.clone();
        entry.state.clone()
    })?;

    let state = match existing {
        Some(state) => state,
        None => {
            let state = init(initial_arg);
            slot.write(ReducerSlot {
                state: state.clone(),
                reducer,
            });
            state
        }
    };

    let dispatch = Dispatch {
        slot: slot.downgrade(),
        _types: PhantomData,
    };
    Ok((state, dispatch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    use crate::dom::{Document, NodeRef};
    use crate::engine::{Runtime, RuntimeOptions};
    use crate::pipeline::mount;
    use crate::error::RenderError;
    use crate::renderer::StringBackend;
    use crate::types::Props;
    use crate::vnode::{component, h, Child};

    #[test]
    fn test_use_state_outside_component() {
        let err = use_state(1).unwrap_err();
        assert!(matches!(err, RenderError::HookOutsideComponent { hook: "use_state" }));
        assert_eq!(err.to_string(), "use_state() must be called inside a function component");
    }

    #[test]
    fn test_state_persists_and_setter_is_stable() {
        thread_local! {
            static SETTERS: RefCell<Vec<StateSetter<i32>>> = const { RefCell::new(Vec::new()) };
            static INITS: RefCell<usize> = const { RefCell::new(0) };
        }

        fn holder(_: &Props) -> Result<Child> {
            let (value, set) = use_state_with(|| {
                INITS.with(|n| *n.borrow_mut() += 1);
                7
            })?;
            SETTERS.with(|s| s.borrow_mut().push(set));
            Ok(value.into())
        }

        let runtime = Runtime::new_static(RuntimeOptions::default());
        let tree: Child = component(holder).into();
        let first = runtime.render(&mut StringBackend, &tree).unwrap();
        let second = runtime.render(&mut StringBackend, &tree).unwrap();

        assert_eq!(first, "7");
        assert_eq!(second, "7");
        assert_eq!(INITS.with(|n| *n.borrow()), 1, "lazy init runs once");
        SETTERS.with(|s| {
            let s = s.borrow();
            assert_eq!(s.len(), 2);
            assert_eq!(s[0], s[1], "setter identity is stable");
        });
    }

    #[test]
    fn test_static_setter_updates_without_rendering() {
        thread_local! {
            static SETTER: RefCell<Option<StateSetter<i32>>> = const { RefCell::new(None) };
        }

        fn holder(_: &Props) -> Result<Child> {
            let (value, set) = use_state(1)?;
            SETTER.with(|s| *s.borrow_mut() = Some(set));
            Ok(value.into())
        }

        let runtime = Runtime::new_static(RuntimeOptions::default());
        let tree: Child = component(holder).into();
        runtime.render(&mut StringBackend, &tree).unwrap();

        let setter = SETTER.with(|s| s.borrow().clone()).unwrap();
        setter.update(|n| n + 4).unwrap();

        let out = runtime.render(&mut StringBackend, &tree).unwrap();
        assert_eq!(out, "5");
    }

    #[test]
    fn test_reducer_keeps_latest_reducer() {
        thread_local! {
            static STEP: RefCell<i32> = const { RefCell::new(1) };
            static DISPATCH: RefCell<Option<Dispatch<i32, ()>>> = const { RefCell::new(None) };
        }

        fn stepper(_: &Props) -> Result<Child> {
            let step = STEP.with(|s| *s.borrow());
            let (total, dispatch) = use_reducer_with_init(move |n: &i32, _: ()| n + step, 5, |n| n * 2)?;
            DISPATCH.with(|d| {
                let mut d = d.borrow_mut();
                if d.is_none() {
                    *d = Some(dispatch);
                }
            });
            Ok(total.into())
        }

        let runtime = Runtime::new_static(RuntimeOptions::default());
        let tree: Child = component(stepper).into();
        assert_eq!(runtime.render(&mut StringBackend, &tree).unwrap(), "10");

        STEP.with(|s| *s.borrow_mut() = 3);
        runtime.render(&mut StringBackend, &tree).unwrap();

        // Dispatcher from the first render, reducer from the second
        let dispatch = DISPATCH.with(|d| d.borrow().clone()).unwrap();
        dispatch.dispatch(()).unwrap();
        assert_eq!(runtime.render(&mut StringBackend, &tree).unwrap(), "13");
    }

    #[test]
    fn test_setter_after_runtime_dropped_is_noop() {
        thread_local! {
            static SETTER: RefCell<Option<StateSetter<&'static str>>> = const { RefCell::new(None) };
        }

        fn holder(_: &Props) -> Result<Child> {
            let (value, set) = use_state("a")?;
            SETTER.with(|s| *s.borrow_mut() = Some(set));
            Ok(value.into())
        }

        {
            let runtime = Runtime::new_static(RuntimeOptions::default());
            runtime.render(&mut StringBackend, &component(holder).into()).unwrap();
        }

        let setter = SETTER.with(|s| s.borrow().clone()).unwrap();
        setter.set("b").unwrap();
    }

    fn mounted_root() -> (Document, NodeRef) {
        let doc = Document::new();
        let root = doc.create_element("div");
        doc.body().append_child(&root).unwrap();
        (doc, root)
    }

    #[test]
    fn test_mounted_dispatch_commits_only_on_change() {
        thread_local! {
            static RENDERS: Cell<usize> = const { Cell::new(0) };
            static DISPATCH: RefCell<Option<Dispatch<i32, i32>>> = const { RefCell::new(None) };
        }

        fn gauge(_: &Props) -> Result<Child> {
            RENDERS.with(|r| r.set(r.get() + 1));
            let (level, dispatch) = use_reducer(|level: &i32, delta: i32| (level + delta).clamp(0, 10), 8)?;
            DISPATCH.with(|d| *d.borrow_mut() = Some(dispatch));
            Ok(level.into())
        }

        let (_doc, root) = mounted_root();
        mount(&root, component(gauge)).unwrap();
        assert_eq!(root.inner_html(), "8");
        let dispatch = DISPATCH.with(|d| d.borrow().clone()).unwrap();

        // Committed by the time dispatch returns
        dispatch.dispatch(5).unwrap();
        assert_eq!(root.inner_html(), "10");
        assert_eq!(RENDERS.with(Cell::get), 2);

        // Clamped to the same state: nothing to do
        dispatch.dispatch(3).unwrap();
        assert_eq!(root.inner_html(), "10");
        assert_eq!(RENDERS.with(Cell::get), 2);

        dispatch.dispatch(-4).unwrap();
        assert_eq!(root.inner_html(), "6");
        assert_eq!(RENDERS.with(Cell::get), 3);
    }

    #[test]
    fn test_mounted_dispatch_from_handler() {
        enum Action {
            Push(&'static str),
            Clear,
        }

        fn list(_: &Props) -> Result<Child> {
            let (items, dispatch) = use_reducer(
                |items: &Vec<&'static str>, action: Action| match action {
                    Action::Push(item) => {
                        let mut next = items.clone();
                        next.push(item);
                        next
                    }
                    Action::Clear => Vec::new(),
                },
                Vec::new(),
            )?;
            let push = dispatch.clone();
            Ok(h("div")
                .child(h("button").id("push").on("click", move |_| push.dispatch(Action::Push("x"))))
                .child(h("button").id("clear").on("click", move |_| dispatch.dispatch(Action::Clear)))
                .child(h("span").child(items.join(",")))
                .into())
        }

        let (doc, root) = mounted_root();
        mount(&root, component(list)).unwrap();
        for _ in 0..3 {
            doc.query_selector("#push").unwrap().click().unwrap();
        }
        assert_eq!(doc.query_selector("span").unwrap().text_content(), "x,x,x");

        doc.query_selector("#clear").unwrap().click().unwrap();
        assert_eq!(doc.query_selector("span").unwrap().text_content(), "");
    }
}
