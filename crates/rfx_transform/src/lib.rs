//! The `$` reactivity-shorthand transform.
//!
//! Source text goes in, source text comes out: a document is scanned for the
//! sigil, each script region is parsed with SWC and walked once, and the
//! walk produces ranged text edits that are spliced into the original. Code
//! without sigil constructs comes back byte-for-byte unchanged.
//!
//! - `$ref(0)` in a declarator declares an unwrap binding; later reads and
//!   writes of it get `.value`
//! - `$$(x)` passes the reference itself
//! - `watch$(x)`, `title$={x}` and `fn$()` bodies auto-wrap what they pass
//!   or return

pub mod classify;
pub mod document;
pub mod edit;
pub mod error;
pub mod helpers;
pub mod pattern;
pub mod rewrite;
pub mod scope;
pub mod source_map;
mod walk;

pub use document::{transform, TransformOutput, Transformer};
pub use edit::{Edit, EditError, EditSet, Mapping};
pub use error::TransformError;
pub use helpers::helper_declarations;
