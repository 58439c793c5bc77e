//! Page assembly: state blobs, the HTML template, router-driven rendering
//! and the client hydration entry.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::dom::Document;
use crate::error::Result;
use crate::pipeline::mount;
use crate::renderer::{escape_html, render_to_string};
use crate::vnode::Child;

pub const DEFAULT_STATE_KEY: &str = "__STATE__";
pub const DEFAULT_ROOT_SELECTOR: &str = "#app";

// =============================================================================
// State blob
// =============================================================================

/// JSON with `<` escaped, safe to embed inside a `<script>` element.
pub fn serialize_state<T: Serialize + ?Sized>(state: &T) -> Result<String> {
    Ok(serde_json::to_string(state)?.replace('<', "\\u003c"))
}

/// Parse a state blob, or return `fallback` when it is not valid.
pub fn deserialize_state<T: DeserializeOwned>(payload: &str, fallback: T) -> T {
    serde_json::from_str(payload).unwrap_or(fallback)
}

// =============================================================================
// Template
// =============================================================================

/// Values for the template placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageParts {
    /// `<!--app-head-->`
    pub head: String,
    /// `<!--app-html-->`
    pub html: String,
    /// `<!--app-state-->`
    pub state: String,
    /// `<!--app-scripts-->`
    pub scripts: String,
}

/// Fill the first occurrence of each placeholder.
pub fn apply_template(template: &str, parts: &PageParts) -> String {
    template
        .replacen("<!--app-head-->", &parts.head, 1)
        .replacen("<!--app-html-->", &parts.html, 1)
        .replacen("<!--app-state-->", &parts.state, 1)
        .replacen("<!--app-scripts-->", &parts.scripts, 1)
}

// =============================================================================
// Router interface
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct RouteRenderOptions {
    /// Data loaded for the route before rendering.
    pub data: Option<Value>,
    pub force_not_found: bool,
    pub error: Option<String>,
}

/// What a router produced for one URL.
#[derive(Debug, Clone)]
pub struct RouteRender {
    pub status: u16,
    /// Empty when the route sets no title.
    pub title: String,
    pub node: Child,
    pub data: Option<Value>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub pattern: String,
    pub params: Vec<(String, String)>,
}

/// URL to page mapping. Route matching lives outside this crate; page
/// rendering only consumes the produced node.
pub trait Router<S> {
    fn render(&self, url: &str, state: &S, options: RouteRenderOptions) -> RouteRender;

    fn resolve(&self, url: &str) -> Option<RouteMatch>;
}

/// Input of a page shell: the routed page plus page-level info.
#[derive(Debug)]
pub struct ShellProps<'a, S> {
    pub state: &'a S,
    pub status: u16,
    pub title: &'a str,
    pub children: Child,
}

pub struct RenderWithRouter<'a, S> {
    pub router: &'a dyn Router<S>,
    pub url: &'a str,
    pub state: &'a S,
    pub shell: &'a dyn Fn(ShellProps<'_, S>) -> Child,
    pub title_prefix: Option<&'a str>,
    pub default_title: Option<&'a str>,
    pub data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    pub html: String,
    /// `<title>` element for `<!--app-head-->`.
    pub head: String,
    pub status: u16,
    pub title: String,
    pub route_title: String,
    pub data: Option<Value>,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Render the routed page for `url` inside the shell.
pub fn render_with_router<S>(options: RenderWithRouter<'_, S>) -> Result<RenderedPage> {
    let route = options.router.render(
        options.url,
        options.state,
        RouteRenderOptions {
            data: options.data,
            ..Default::default()
        },
    );

    let route_title = non_empty(Some(route.title.as_str()))
        .or(non_empty(options.default_title))
        .unwrap_or("Untitled")
        .to_string();
    let title = match non_empty(options.title_prefix) {
        Some(prefix) => format!("{prefix} - {route_title}"),
        None => route_title.clone(),
    };

    let shell = (options.shell)(ShellProps {
        state: options.state,
        status: route.status,
        title: &route_title,
        children: route.node,
    });
    let html = render_to_string(&shell)?;
    debug!(url = options.url, status = route.status, "rendered page");

    Ok(RenderedPage {
        html,
        head: format!("<title>{}</title>", escape_html(&title)),
        status: route.status,
        title,
        route_title,
        data: route.data,
    })
}

// =============================================================================
// Client entry
// =============================================================================

/// Read the server state from the page global `state_key` and mount
/// `build(state)` onto the node matching `root_selector`.
///
/// A missing or malformed state falls back to `fallback()`. Returns
/// `Ok(false)` when the root does not exist.
pub fn hydrate_root<S, B>(
    document: &Document,
    root_selector: &str,
    state_key: &str,
    fallback: impl FnOnce() -> S,
    build: B,
) -> Result<bool>
where
    S: DeserializeOwned,
    B: FnOnce(S) -> Child,
{
    let Some(root) = document.query_selector(root_selector) else {
        warn!(root_selector, "hydration root not found");
        return Ok(false);
    };

    let state = match document.global(state_key) {
        Some(value) => serde_json::from_value(value).unwrap_or_else(|error| {
            warn!(state_key, %error, "malformed page state, using fallback");
            fallback()
        }),
        None => fallback(),
    };

    mount(&root, build(state))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vnode::h;
    use serde::Deserialize;

    #[test]
    fn test_state_blob_escapes_script_close() {
        let blob = serialize_state(&serde_json::json!({ "html": "</script><b>" }));
        assert_eq!(blob.unwrap(), r#"{"html":"\u003c/script>\u003cb>"}"#);
    }

    #[test]
    fn test_deserialize_state_fallback() {
        let parsed: Vec<i32> = deserialize_state("[1,2]", vec![]);
        assert_eq!(parsed, vec![1, 2]);
        let broken: Vec<i32> = deserialize_state("[1,", vec![9]);
        assert_eq!(broken, vec![9]);
    }

    #[test]
    fn test_apply_template_first_occurrence_only() {
        let template = "<head><!--app-head--></head><div id=\"app\"><!--app-html--></div>\
                        <script>window.__STATE__=<!--app-state--></script><!--app-scripts--><!--app-html-->";
        let page = apply_template(
            template,
            &PageParts {
                head: "<title>T</title>".into(),
                html: "<p>x</p>".into(),
                state: "{}".into(),
                scripts: String::new(),
            },
        );
        assert_eq!(
            page,
            "<head><title>T</title></head><div id=\"app\"><p>x</p></div>\
             <script>window.__STATE__={}</script><!--app-html-->"
        );
    }

    struct OnePage;

    impl Router<u32> for OnePage {
        fn render(&self, url: &str, state: &u32, _: RouteRenderOptions) -> RouteRender {
            let found = url == "/";
            RouteRender {
                status: if found { 200 } else { 404 },
                title: if found { String::new() } else { "Not <found>".into() },
                node: h("p").child(format!("{url}:{state}")).into(),
                data: None,
                error: None,
            }
        }

        fn resolve(&self, url: &str) -> Option<RouteMatch> {
            (url == "/").then(|| RouteMatch {
                pattern: "/".into(),
                params: Vec::new(),
            })
        }
    }

    fn shell(props: ShellProps<'_, u32>) -> Child {
        h("main").prop("data-title", props.title).child(props.children).into()
    }

    #[test]
    fn test_render_with_router_titles() {
        let page = render_with_router(RenderWithRouter {
            router: &OnePage,
            url: "/",
            state: &7,
            shell: &shell,
            title_prefix: Some("Site"),
            default_title: Some("Home"),
            data: None,
        })
        .unwrap();
        assert_eq!(page.route_title, "Home");
        assert_eq!(page.title, "Site - Home");
        assert_eq!(page.html, "<main data-title=\"Home\"><p>/:7</p></main>");
        assert_eq!(page.head, "<title>Site - Home</title>");

        let missing = render_with_router(RenderWithRouter {
            router: &OnePage,
            url: "/nope",
            state: &1,
            shell: &shell,
            title_prefix: None,
            default_title: None,
            data: None,
        })
        .unwrap();
        assert_eq!(missing.status, 404);
        assert_eq!(missing.head, "<title>Not &lt;found&gt;</title>");
    }

    #[derive(Debug, Deserialize)]
    struct AppState {
        count: i32,
    }

    #[test]
    fn test_hydrate_root_reads_state_or_falls_back() {
        let doc = Document::new();
        let app = doc.create_element("div");
        app.set_attribute("id", "app");
        doc.body().append_child(&app).unwrap();

        doc.set_global(DEFAULT_STATE_KEY, serde_json::json!({ "count": 4 }));
        let build = |state: AppState| -> Child { h("span").child(state.count).into() };
        let mounted = hydrate_root(&doc, DEFAULT_ROOT_SELECTOR, DEFAULT_STATE_KEY, || AppState { count: 0 }, build);
        assert!(mounted.unwrap());
        assert_eq!(app.inner_html(), "<span>4</span>");

        doc.set_global(DEFAULT_STATE_KEY, serde_json::json!("garbage"));
        let mounted = hydrate_root(&doc, DEFAULT_ROOT_SELECTOR, DEFAULT_STATE_KEY, || AppState { count: -1 }, build);
        assert!(mounted.unwrap());
        assert_eq!(app.inner_html(), "<span>-1</span>");

        let missing = hydrate_root(&doc, "#nowhere", DEFAULT_STATE_KEY, || AppState { count: 0 }, build);
        assert!(!missing.unwrap());
    }
}
