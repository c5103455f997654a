//! Deferred reference classification.
//!
//! The walker only records references; whether an identifier needs `.value`
//! depends on bindings that may be declared later (hoisting) and on spans
//! other rewriters mark as explicit. Both are settled once the walk is done.

use rfx_ast::Resolution;
use rustc_hash::FxHashSet;
use swc_common::{BytePos, Span};

use crate::edit::Emitter;
use crate::scope::{BindingKind, FrameId, ScopeTracker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// One identifier occurrence in expression position.
#[derive(Debug, Clone)]
pub struct Reference {
    pub name: String,
    pub lo: BytePos,
    pub hi: BytePos,
    pub frame: FrameId,
    pub access: Access,
    /// `{ name }` in an object literal.
    pub shorthand: bool,
    /// Spans of the member/call/wrapper chain the identifier heads.
    pub chain: Vec<Span>,
    /// Inside the value of an exempt attribute.
    pub exempt_context: bool,
    /// Counter verdict sampled when the identifier was visited.
    pub active_when_visited: bool,
}

impl Reference {
    pub fn span(&self) -> Span {
        Span::new(self.lo, self.hi)
    }
}

/// Spans that already denote a wrapped reference.
#[derive(Debug, Default)]
pub struct ExplicitRefs(FxHashSet<(BytePos, BytePos)>);

impl ExplicitRefs {
    pub fn insert(&mut self, span: Span) {
        self.0.insert((span.lo, span.hi));
    }

    pub fn contains(&self, span: Span) -> bool {
        self.0.contains(&(span.lo, span.hi))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// No active unwrap binding for the name.
    NotReactive,
    /// The identifier or its enclosing chain is an explicit reference.
    Explicit,
    /// Inside an exempt attribute value.
    ExemptAttribute,
    Read,
    Write,
    /// `{ name }`: the key must be spelled out before `.value` is appended.
    ShorthandKey,
}

impl Classification {
    pub fn needs_value(self) -> bool {
        matches!(
            self,
            Classification::Read | Classification::Write | Classification::ShorthandKey
        )
    }
}

pub fn classify(
    reference: &Reference,
    scopes: &ScopeTracker,
    explicit: &ExplicitRefs,
    resolution: Resolution,
) -> Classification {
    let active = match resolution {
        Resolution::Lexical => {
            scopes.resolve(reference.frame, &reference.name) == Some(BindingKind::Unwrap)
        }
        Resolution::Counting => reference.active_when_visited,
    };
    if !active {
        return Classification::NotReactive;
    }
    if explicit.contains(reference.span())
        || reference.chain.iter().any(|span| explicit.contains(*span))
    {
        return Classification::Explicit;
    }
    if reference.exempt_context {
        return Classification::ExemptAttribute;
    }
    if reference.shorthand {
        return Classification::ShorthandKey;
    }
    match reference.access {
        Access::Read => Classification::Read,
        Access::Write => Classification::Write,
    }
}

/// Classify every recorded reference and emit the `.value` edits.
/// Returns how many references were rewritten.
pub fn resolve_references(
    references: &[Reference],
    scopes: &ScopeTracker,
    explicit: &ExplicitRefs,
    resolution: Resolution,
    emitter: &mut Emitter,
) -> usize {
    let mut rewritten = 0;
    for reference in references {
        let class = classify(reference, scopes, explicit, resolution);
        if class == Classification::ShorthandKey {
            emitter.insert_before(reference.lo, format!("{}: ", reference.name));
        }
        if class.needs_value() {
            emitter.insert_after(reference.hi, ".value");
            rewritten += 1;
        }
    }
    rewritten
}
