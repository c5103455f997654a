//! Shared vocabulary for the rfx transform.
//!
//! Re-exports the standard SWC AST and adds the pieces every rfx crate
//! agrees on:
//! - the sigil character and the trigger-name exclusion list
//! - `Options`, the configuration surface exposed to callers
//! - `Lang` and `ScriptRegion`, describing what a unit of input is

pub use swc_ecma_ast::*;

use serde::{Deserialize, Serialize};

/// The reactivity-shorthand sigil.
pub const SIGIL: char = '$';

/// Prefix for every synthetic binding and helper alias the transform emits.
pub const HELPER_PREFIX: &str = "__rfx_";

/// Names that never act as the implicit unwrap-call trigger (`$name(...)`),
/// because the framework already ships `$`-prefixed macros of that name.
pub const DEFAULT_IGNORE: &[&str] = &[
    "defineProps",
    "defineProp",
    "defineModels",
    "defineEmits",
    "defineSlots",
];

/// Source dialect of one parsed unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Js,
    Jsx,
    Ts,
    Tsx,
}

impl Lang {
    /// Dialect implied by a file extension. Returns `None` for anything that
    /// is not a script file (including `.vue`, which holds script regions).
    pub fn from_path(path: &str) -> Option<Lang> {
        let ext = path.rsplit_once('.').map(|(_, ext)| ext)?;
        match ext {
            "js" | "mjs" | "cjs" => Some(Lang::Js),
            "jsx" => Some(Lang::Jsx),
            "ts" | "mts" | "cts" => Some(Lang::Ts),
            "tsx" => Some(Lang::Tsx),
            _ => None,
        }
    }

    /// Dialect named by a `<script lang="...">` attribute.
    pub fn from_attr(lang: Option<&str>) -> Lang {
        match lang {
            Some("ts") => Lang::Ts,
            Some("tsx") => Lang::Tsx,
            Some("jsx") => Lang::Jsx,
            _ => Lang::Js,
        }
    }

    pub fn is_typescript(self) -> bool {
        matches!(self, Lang::Ts | Lang::Tsx)
    }

    pub fn has_jsx(self) -> bool {
        matches!(self, Lang::Jsx | Lang::Tsx)
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lang::Js => write!(f, "js"),
            Lang::Jsx => write!(f, "jsx"),
            Lang::Ts => write!(f, "ts"),
            Lang::Tsx => write!(f, "tsx"),
        }
    }
}

/// Returns true for single-file component paths whose scripts live in
/// `<script>` regions rather than spanning the whole file.
pub fn is_component_path(path: &str) -> bool {
    path.ends_with(".vue")
}

/// One independently transformed script region of an input document.
///
/// `start..end` are byte offsets of the region content inside the document.
/// A plain script file is a single region covering the whole text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptRegion {
    pub start: usize,
    pub end: usize,
    pub lang: Lang,
    /// `<script setup>` rather than a plain `<script>` block.
    pub setup: bool,
}

impl ScriptRegion {
    pub fn whole(source: &str, lang: Lang) -> Self {
        Self {
            start: 0,
            end: source.len(),
            lang,
            setup: false,
        }
    }
}

/// How references are matched against unwrap bindings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// Build a scope tree during the walk and resolve every reference to
    /// its innermost declaring frame afterwards.
    #[default]
    Lexical,
    /// Global per-name occurrence counters, sampled when the reference is
    /// visited. Order-sensitive; kept for hosts without scope analysis.
    Counting,
}

/// Transform configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    /// Extra names excluded from the `$name(...)` unwrap trigger.
    pub ignore: Vec<String>,
    /// Path globs a driver should transform. Not read by the core.
    pub include: Vec<String>,
    /// Path globs a driver should skip. Not read by the core.
    pub exclude: Vec<String>,
    /// Module the helper primitives are imported from.
    pub runtime_module: String,
    /// Callee inserted around auto-wrapped expressions.
    pub wrap_fn: String,
    /// JSX attributes (name or namespace) whose values never get `.value`.
    pub exempt_attributes: Vec<String>,
    pub resolution: Resolution,
    /// Append helper signature declarations to the output.
    pub declarations: bool,
    /// Produce a source map alongside the output.
    pub source_map: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            ignore: Vec::new(),
            include: vec!["**/*.{js,mjs,cjs,jsx,ts,mts,cts,tsx,vue}".to_string()],
            exclude: vec!["**/node_modules/**".to_string()],
            runtime_module: "vue".to_string(),
            wrap_fn: "$$".to_string(),
            exempt_attributes: vec!["v-slot".to_string()],
            resolution: Resolution::default(),
            declarations: false,
            source_map: false,
        }
    }
}

impl Options {
    /// The effective exclusion list: defaults first, then user entries with
    /// one leading sigil stripped. Duplicates are dropped.
    pub fn ignore_list(&self) -> Vec<String> {
        let mut list: Vec<String> = DEFAULT_IGNORE.iter().map(|s| s.to_string()).collect();
        for name in &self.ignore {
            let name = name.strip_prefix(SIGIL).unwrap_or(name);
            if !name.is_empty() && !list.iter().any(|n| n == name) {
                list.push(name.to_string());
            }
        }
        list
    }

    pub fn is_exempt_attribute(&self, name: &str) -> bool {
        self.exempt_attributes.iter().any(|a| a == name)
    }
}
