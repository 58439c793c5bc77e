//! Memoization hooks: `use_memo`, `use_callback` and `use_ref`.

use std::any::Any;
use std::cell::{Ref as CellRef, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::engine::frame;
use crate::engine::store::{deps_changed, HookKind};
use crate::error::Result;

struct MemoSlot<T> {
    value: T,
    deps: Box<dyn Any>,
}

/// Cache `factory()` until `deps` changes (compared with `PartialEq`).
///
/// Deps are usually a tuple or a `Vec`; a deps value of a different type
/// than last render counts as changed.
pub fn use_memo<T, D>(factory: impl FnOnce() -> T, deps: D) -> Result<T>
where
    T: Clone + 'static,
    D: PartialEq + 'static,
{
    let slot = frame::next_slot(HookKind::Memo)?;

    let cached = slot.read(|memo: &MemoSlot<T>| {
        (!deps_changed(Some(&*memo.deps), &deps)).then(|| memo.value.clone())
    })?;
    if let Some(Some(value)) = cached {
        return Ok(value);
    }

    let value = factory();
    slot.write(MemoSlot {
        value: value.clone(),
        deps: Box::new(deps),
    });
    Ok(value)
}

/// Keep the same callback until `deps` changes.
pub fn use_callback<F, D>(callback: F, deps: D) -> Result<Rc<F>>
where
    F: 'static,
    D: PartialEq + 'static,
{
    use_memo(move || Rc::new(callback), deps)
}

// =============================================================================
// use_ref
// =============================================================================

/// Mutable box that survives re-renders. Writing to it never re-renders.
pub struct Ref<T>(Rc<RefCell<T>>);

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: fmt::Debug> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Ref").field(&self.0.borrow()).finish()
    }
}

impl<T> Ref<T> {
    pub fn new(value: T) -> Self {
        Self(Rc::new(RefCell::new(value)))
    }

    pub fn borrow(&self) -> CellRef<'_, T> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.0.borrow_mut()
    }

    pub fn set(&self, value: T) {
        *self.0.borrow_mut() = value;
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: Clone> Ref<T> {
    pub fn get(&self) -> T {
        self.0.borrow().clone()
    }
}

/// Persistent mutable box, created from `initial` on the first render.
pub fn use_ref<T: 'static>(initial: T) -> Result<Ref<T>> {
    let slot = frame::next_slot(HookKind::Ref)?;
    if let Some(existing) = slot.read(|r: &Ref<T>| r.clone())? {
        return Ok(existing);
    }

    let created = Ref::new(initial);
    slot.write(created.clone());
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::engine::{Runtime, RuntimeOptions};
    use crate::renderer::StringBackend;
    use crate::types::Props;
    use crate::vnode::{component, Child};

    thread_local! {
        static FACTORY_RUNS: Cell<usize> = const { Cell::new(0) };
        static DEPS: RefCell<Vec<i32>> = const { RefCell::new(Vec::new()) };
    }

    fn memoized(_: &Props) -> Result<Child> {
        let deps = DEPS.with(|d| d.borrow().clone());
        let total = use_memo(
            || {
                FACTORY_RUNS.with(|n| n.set(n.get() + 1));
                deps.iter().sum::<i32>()
            },
            deps.clone(),
        )?;
        Ok(total.into())
    }

    #[test]
    fn test_memo_same_deps_runs_factory_once() {
        DEPS.with(|d| *d.borrow_mut() = vec![1]);
        FACTORY_RUNS.with(|n| n.set(0));

        let runtime = Runtime::new_static(RuntimeOptions::default());
        let tree: Child = component(memoized).into();
        runtime.render(&mut StringBackend, &tree).unwrap();
        runtime.render(&mut StringBackend, &tree).unwrap();

        assert_eq!(FACTORY_RUNS.with(Cell::get), 1, "[1] -> [1] must not recompute");
    }

    #[test]
    fn test_memo_recomputes_on_change_and_length() {
        DEPS.with(|d| *d.borrow_mut() = vec![1]);
        FACTORY_RUNS.with(|n| n.set(0));

        let runtime = Runtime::new_static(RuntimeOptions::default());
        let tree: Child = component(memoized).into();
        runtime.render(&mut StringBackend, &tree).unwrap();

        DEPS.with(|d| *d.borrow_mut() = vec![2]);
        let out = runtime.render(&mut StringBackend, &tree).unwrap();
        assert_eq!(Some(out.as_str()), Some("2"));

        DEPS.with(|d| *d.borrow_mut() = vec![2, 3]);
        let out = runtime.render(&mut StringBackend, &tree).unwrap();
        assert_eq!(Some(out.as_str()), Some("5"));
        assert_eq!(FACTORY_RUNS.with(Cell::get), 3);
    }

    #[test]
    fn test_ref_and_callback_are_stable() {
        thread_local! {
            static SEEN: RefCell<Vec<(Ref<i32>, Rc<fn() -> i32>)>> = const { RefCell::new(Vec::new()) };
        }

        fn holder(_: &Props) -> Result<Child> {
            let counter = use_ref(0)?;
            *counter.borrow_mut() += 1;
            let callback: Rc<fn() -> i32> = use_callback((|| 42) as fn() -> i32, ())?;
            SEEN.with(|s| s.borrow_mut().push((counter, callback)));
            Ok(Child::Empty)
        }

        let runtime = Runtime::new_static(RuntimeOptions::default());
        let tree: Child = component(holder).into();
        runtime.render(&mut StringBackend, &tree).unwrap();
        runtime.render(&mut StringBackend, &tree).unwrap();

        SEEN.with(|s| {
            let s = s.borrow();
            assert!(s[0].0.ptr_eq(&s[1].0), "same ref box");
            assert_eq!(s[1].0.get(), 2);
            assert!(Rc::ptr_eq(&s[0].1, &s[1].1), "same callback");
        });
    }
}
