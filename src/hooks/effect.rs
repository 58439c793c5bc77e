//! Effect hook: `use_effect`.
//!
//! Effects are queued while a component renders and run after the commit
//! that produced its output, in render order. One-shot renders
//! (`render_to_string`, `render_to_dom`) never run them.

use crate::engine::frame;
use crate::engine::store::{deps_changed, EffectEntry, HookKind, Slot};
use crate::engine::Cleanup;
use crate::error::{RenderError, Result};

/// Run `effect` after the commit that rendered this component.
///
/// With `Some(deps)` the effect only runs on the first render and when
/// `deps` changes; `None` runs it after every render. Before a re-run, and
/// when the component leaves the tree, the cleanup from the previous run
/// is called.
///
/// Effects never run during one-shot renders (`render_to_string`).
///
/// ```ignore
/// use_effect(move || {
///     let id = timers.start(tick);
///     Ok(Some(Box::new(move || timers.stop(id)) as Cleanup))
/// }, Some(interval))?;
/// ```
pub fn use_effect<F, D>(effect: F, deps: Option<D>) -> Result<()>
where
    F: FnOnce() -> Result<Option<Cleanup>> + 'static,
    D: PartialEq + 'static,
{
    let slot = frame::next_slot(HookKind::Effect)?;

    let outcome = slot.with_store(|store, index| {
        let changed = match store.slot_mut(index) {
            Some(Slot::Effect(entry)) => match &deps {
                Some(next) => deps_changed(entry.deps.as_deref(), next),
                None => true,
            },
            None | Some(Slot::Vacant) => {
                store.put(
                    index,
                    Slot::Effect(EffectEntry {
                        deps: None,
                        effect: None,
                        cleanup: None,
                    }),
                );
                true
            }
            Some(Slot::Value(_)) => return Err(()),
        };

        if changed && let Some(Slot::Effect(entry)) = store.slot_mut(index) {
            entry.deps = deps.map(|d| Box::new(d) as Box<dyn std::any::Any>);
            entry.effect = Some(Box::new(effect));
        }
        Ok(changed)
    });

    match outcome {
        Some(Ok(true)) => {
            slot.runtime.queue_effect(slot.path.clone(), slot.store, slot.index);
            Ok(())
        }
        Some(Err(())) => Err(RenderError::SlotType {
            path: slot.path.to_string(),
            index: slot.index,
            hook: HookKind::Effect.name(),
        }),
        _ => Ok(()),
    }
}
