//! Server rendering and page hydration.
//!
//! The server side renders a routed page to a string, embeds it plus the
//! serialized state into an HTML template and streams the result out in
//! chunks. The client side reads the state back from a page global and
//! mounts the same tree onto the server markup, either as one root
//! ([`hydrate_root`]) or per island ([`IslandRegistry::hydrate`]).
//!
//! ```text
//! render_with_router ─► apply_template ─► html_chunks ─► stream_to_response
//!        │                    ▲
//!        └── IslandRegistry::collect ──► serialize_islands
//! ```

mod islands;
mod page;
mod stream;

pub use islands::{
    serialize_islands, Collected, HydrateOptions, HydrationReport, Island, IslandError, IslandOptions,
    IslandPayloadEntry, IslandRegistry, DEFAULT_ISLANDS_KEY, ISLAND_ID_ATTR, ISLAND_KEY_ATTR,
};
pub use page::{
    apply_template, deserialize_state, hydrate_root, render_with_router, serialize_state, PageParts, RenderWithRouter,
    RenderedPage, RouteMatch, RouteRender, RouteRenderOptions, Router, ShellProps, DEFAULT_ROOT_SELECTOR,
    DEFAULT_STATE_KEY,
};
pub use stream::{html_chunks, stream_to_response, ChunkOptions, ChunkedWriter, HtmlChunks, ResponseSink, DEFAULT_CHUNK_SIZE};
