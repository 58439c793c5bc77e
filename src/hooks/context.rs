//! Context hook: `use_context`.

use crate::engine::frame;
use crate::engine::store::HookKind;
use crate::engine::Context;
use crate::error::Result;

/// Read the innermost provided value of `context`, or its default when no
/// provider is above the calling component.
///
/// A provider whose value is not a `T` is treated as absent.
pub fn use_context<T: Clone + 'static>(context: &Context<T>) -> Result<T> {
    let slot = frame::next_slot(HookKind::Context)?;

    let provided = slot
        .runtime
        .context_value(context.id())
        .and_then(|value| value.downcast::<T>());

    Ok(match provided {
        Some(value) => (*value).clone(),
        None => context.default_value().clone(),
    })
}
