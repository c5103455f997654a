//! Parsing adapter for rfx.
//!
//! Wraps the standard SWC parser. The sigil is an ordinary identifier
//! character in JavaScript, so no syntax extension is needed: every
//! reactivity-shorthand construct already parses as a plain call,
//! declarator, attribute or function. This crate only adds:
//!
//! - dialect selection (`Lang`) and span-to-offset bookkeeping
//! - `<script>` region discovery in single-file components
//! - a quick text scan deciding whether a unit needs parsing at all

pub mod parse;
pub mod regions;
pub mod scan;

pub use parse::{parse_expression, parse_script, ExprParseResult, ParseResult, Parsed};
pub use regions::script_regions;
pub use scan::contains_sigil;
