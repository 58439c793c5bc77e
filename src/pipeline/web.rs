//! Mounting into a browser page (feature `web`).
//!
//! Works like [`mount`](super::mount()) on a `web_sys::Element`: one
//! runtime per root, synchronous commits, the same hook semantics. Every
//! commit builds a fresh subtree with [`WebBackend`] and swaps it in.
//!
//! Handlers are not bound on the built elements. The root gets one capture
//! listener per event type, and each commit replaces the table of
//! (element, event type, handler) entries it dispatches from. An event
//! walks from its target up to the root, running matching handlers until
//! one stops propagation. Replacing nodes during a commit therefore never
//! drops a listener closure that is still running.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{debug, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, Node};

use crate::dom::Event;
use crate::engine::{Runtime, RuntimeOptions, ROOT_PATH};
use crate::error::{RenderError, Result};
use crate::renderer::{Listener, WebBackend};
use crate::types::EventHandler;
use crate::vnode::Child;

use super::mount::{MountHost, MountTarget};

type NativeListener = Closure<dyn FnMut(web_sys::Event)>;

thread_local! {
    /// Mounted runtimes by root element.
    static MOUNTED: RefCell<Vec<(Element, Runtime)>> = const { RefCell::new(Vec::new()) };
    /// Closures of dropped hosts, freed once no event is being dispatched.
    static RETIRED: RefCell<Vec<NativeListener>> = const { RefCell::new(Vec::new()) };
    static DISPATCH_DEPTH: Cell<usize> = const { Cell::new(0) };
}

fn free_retired() {
    if DISPATCH_DEPTH.with(Cell::get) == 0 {
        let retired = RETIRED.with(|r| std::mem::take(&mut *r.borrow_mut()));
        drop(retired);
    }
}

// =============================================================================
// Host
// =============================================================================

struct WebHost {
    root: Element,
    document: Document,
    listeners: Rc<RefCell<Vec<Listener>>>,
    /// Root listeners, one per event type.
    delegated: RefCell<Vec<(String, NativeListener)>>,
}

impl WebHost {
    fn new(root: Element, document: Document) -> Self {
        Self {
            root,
            document,
            listeners: Rc::new(RefCell::new(Vec::new())),
            delegated: RefCell::new(Vec::new()),
        }
    }

    fn delegate(&self, event_type: &str) -> Result<()> {
        if self.delegated.borrow().iter().any(|(known, _)| known == event_type) {
            return Ok(());
        }

        let table = self.listeners.clone();
        let root = self.root.clone();
        let closure = NativeListener::new(move |native: web_sys::Event| {
            DISPATCH_DEPTH.with(|d| d.set(d.get() + 1));
            let result = dispatch(&table, &root, native);
            DISPATCH_DEPTH.with(|d| d.set(d.get() - 1));
            if let Err(error) = result {
                warn!(%error, "event handler failed");
            }
            free_retired();
        });
        self.root
            .add_event_listener_with_callback_and_bool(event_type, closure.as_ref().unchecked_ref(), true)?;
        self.delegated.borrow_mut().push((event_type.to_string(), closure));
        Ok(())
    }
}

impl MountHost for WebHost {
    fn build(&self, runtime: &Runtime, tree: &Child) -> Result<bool> {
        // Nodes of a failed build were never attached; the page keeps the
        // previous output.
        let mut backend = WebBackend::new(&self.document);
        let fresh = runtime.evaluate(&mut backend, tree, ROOT_PATH)?;

        clear(&self.root)?;
        self.root.append_child(&fresh)?;

        let listeners = backend.into_listeners();
        for listener in &listeners {
            self.delegate(&listener.event_type)?;
        }
        *self.listeners.borrow_mut() = listeners;
        Ok(true)
    }
}

impl Drop for WebHost {
    fn drop(&mut self) {
        let delegated = std::mem::take(self.delegated.get_mut());
        for (event_type, closure) in &delegated {
            let _ = self.root.remove_event_listener_with_callback_and_bool(
                event_type,
                closure.as_ref().unchecked_ref(),
                true,
            );
        }
        RETIRED.with(|r| r.borrow_mut().extend(delegated.into_iter().map(|(_, closure)| closure)));
    }
}

/// Element an event starts at: the target, or a text target's parent.
fn start_element(native: &web_sys::Event) -> Option<Element> {
    let node = native.target()?.dyn_into::<Node>().ok()?;
    match node.dyn_into::<Element>() {
        Ok(element) => Some(element),
        Err(node) => node.parent_element(),
    }
}

fn dispatch(table: &RefCell<Vec<Listener>>, root: &Element, native: web_sys::Event) -> Result<()> {
    let event_type = native.type_();
    let Some(mut current) = start_element(&native) else {
        return Ok(());
    };
    let event = Event::from_native(native);

    loop {
        // Handlers commit synchronously and replace the table
        let handlers: Vec<EventHandler> = table
            .borrow()
            .iter()
            .filter(|l| l.event_type == event_type && l.element == current)
            .map(|l| l.handler.clone())
            .collect();
        for handler in handlers {
            handler.call(&event)?;
        }

        if event.propagation_stopped() || current == *root {
            return Ok(());
        }
        match current.parent_element() {
            Some(parent) => current = parent,
            None => return Ok(()),
        }
    }
}

fn clear(root: &Element) -> Result<()> {
    while let Some(child) = root.first_child() {
        root.remove_child(&child)?;
    }
    Ok(())
}

// =============================================================================
// Mount / unmount
// =============================================================================

/// Render `tree` into `root` and keep it live.
///
/// Mounting again on the same element swaps the tree and re-renders with
/// the existing hook state.
pub fn mount_web(root: &Element, tree: impl Into<Child>) -> Result<()> {
    mount_web_with_options(root, tree, RuntimeOptions::default())
}

/// [`mount_web`] with runtime options. The options only take effect when
/// the root's runtime is created.
pub fn mount_web_with_options(root: &Element, tree: impl Into<Child>, options: RuntimeOptions) -> Result<()> {
    free_retired();
    let tree = tree.into();

    let runtime = match mounted_runtime(root) {
        Some(runtime) => {
            runtime.set_tree(tree);
            runtime
        }
        None => {
            let document = root.owner_document().ok_or(RenderError::DetachedNode)?;
            let target = MountTarget {
                host: Rc::new(WebHost::new(root.clone(), document)),
                tree,
            };
            let runtime = Runtime::new_mounted(options, target);
            MOUNTED.with(|m| m.borrow_mut().push((root.clone(), runtime.clone())));
            debug!(root = %root.tag_name(), "mounted web root");
            runtime
        }
    };

    runtime.schedule_render()
}

/// Drop the root's runtime, run all remaining effect cleanups and clear
/// the root. Returns `false` when nothing was mounted there.
pub fn unmount_web(root: &Element) -> Result<bool> {
    let taken = MOUNTED.with(|m| {
        let mut mounted = m.borrow_mut();
        let position = mounted.iter().position(|(element, _)| element == root)?;
        Some(mounted.remove(position).1)
    });
    let Some(runtime) = taken else {
        return Ok(false);
    };

    runtime.detach_host();
    runtime.dispose();
    clear(root)?;
    free_retired();
    debug!(root = %root.tag_name(), "unmounted web root");
    Ok(true)
}

/// Whether `root` has a mounted runtime.
pub fn is_web_mounted(root: &Element) -> bool {
    mounted_runtime(root).is_some()
}

fn mounted_runtime(root: &Element) -> Option<Runtime> {
    MOUNTED.with(|m| {
        m.borrow()
            .iter()
            .find(|(element, _)| element == root)
            .map(|(_, runtime)| runtime.clone())
    })
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    use crate::engine::Cleanup;
    use crate::hooks::{use_effect, use_state};
    use crate::types::Props;
    use crate::vnode::{component, h};
    use web_sys::HtmlElement;

    wasm_bindgen_test_configure!(run_in_browser);

    fn web_root() -> Element {
        let document = web_sys::window().unwrap().document().unwrap();
        let root = document.create_element("div").unwrap();
        document.body().unwrap().append_child(&root).unwrap();
        root
    }

    fn click(root: &Element, selector: &str) {
        let target = root.query_selector(selector).unwrap().unwrap();
        target.dyn_into::<HtmlElement>().unwrap().click();
    }

    fn counter(_: &Props) -> Result<Child> {
        let (count, set_count) = use_state(0)?;
        Ok(h("div")
            .child(h("span").child(format!("count:{count}")))
            .child(
                h("button")
                    .id("inc")
                    .on("click", move |_| set_count.update(|n| n + 1))
                    .child(h("b").child("+")),
            )
            .into())
    }

    #[wasm_bindgen_test]
    fn test_clicks_commit_synchronously() {
        let root = web_root();
        mount_web(&root, component(counter)).unwrap();
        assert!(root.text_content().unwrap().contains("count:0"));

        click(&root, "#inc");
        assert!(root.text_content().unwrap().contains("count:1"));

        // Target is a child of the element with the handler
        click(&root, "#inc b");
        assert!(root.text_content().unwrap().contains("count:2"));

        assert!(unmount_web(&root).unwrap());
        assert_eq!(root.inner_html(), "");
        assert!(!is_web_mounted(&root));
    }

    #[wasm_bindgen_test]
    fn test_stop_propagation_ends_walk() {
        fn nested(_: &Props) -> Result<Child> {
            let (outer, set_outer) = use_state(0)?;
            Ok(h("div")
                .id("outer")
                .on("click", move |_| set_outer.update(|n| n + 1))
                .child(h("button").id("inner").on("click", |event| {
                    event.stop_propagation();
                    Ok(())
                }))
                .child(h("p").child(outer))
                .into())
        }

        let root = web_root();
        mount_web(&root, component(nested)).unwrap();
        click(&root, "#inner");
        assert_eq!(root.query_selector("p").unwrap().unwrap().text_content().as_deref(), Some("0"));
        click(&root, "#outer");
        assert_eq!(root.query_selector("p").unwrap().unwrap().text_content().as_deref(), Some("1"));
        unmount_web(&root).unwrap();
    }

    #[wasm_bindgen_test]
    fn test_unmount_runs_cleanups() {
        thread_local! {
            static CLEANED: Cell<bool> = const { Cell::new(false) };
        }

        fn tracked(_: &Props) -> Result<Child> {
            use_effect(|| Ok(Some(Box::new(|| CLEANED.with(|c| c.set(true))) as Cleanup)), Some(()))?;
            Ok("live".into())
        }

        let root = web_root();
        mount_web(&root, component(tracked)).unwrap();
        assert_eq!(root.inner_html(), "live");
        assert!(unmount_web(&root).unwrap());
        assert!(CLEANED.with(Cell::get));
        assert!(!unmount_web(&root).unwrap());
    }
}
