//! Destructuring of unwrap calls: `let { a, b = 1, ...rest } = $useThing()`.
//!
//! The pattern is replaced by a temporary holding the call result, and one
//! derived declarator per field is appended to the same declaration:
//!
//! ```text
//! let __rfx_ref0 = useThing()
//! ,a = __rfx_toRef(__rfx_ref0, 'a')
//! ,b = __rfx_toRef(__rfx_ref0, 'b', 1)
//! ,rest = __rfx_createPropsRestProxy(__rfx_ref0, ['a', 'b'])
//! ```
//!
//! Fields become unwrap bindings; the rest binding is an ordinary value.

use swc_common::{Span, Spanned};
use swc_ecma_ast::*;

use crate::helpers::Helper;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKey {
    /// Identifier or numeric object key, emitted quoted.
    Name(String),
    /// String literal key, emitted exactly as written.
    Literal(String),
    /// Array position.
    Index(usize),
}

impl FieldKey {
    fn as_argument(&self) -> String {
        match self {
            FieldKey::Name(name) => format!("'{name}'"),
            FieldKey::Literal(raw) => raw.clone(),
            FieldKey::Index(i) => i.to_string(),
        }
    }

    fn as_excluded(&self) -> String {
        match self {
            FieldKey::Name(name) => format!("'{name}'"),
            FieldKey::Literal(raw) => raw.clone(),
            FieldKey::Index(i) => format!("'{i}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternKind {
    Object,
    Array,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Field {
        local: String,
        key: FieldKey,
        default: Option<Span>,
    },
    Rest {
        local: String,
    },
}

/// Everything needed to rewrite one destructuring declarator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternPlan {
    pub kind: PatternKind,
    /// Range overwritten by the temporary (the pattern itself, without any
    /// type annotation).
    pub span: Span,
    pub bindings: Vec<Binding>,
}

impl PatternPlan {
    /// Plan an object or array pattern. Returns `None` for shapes that are
    /// left untouched: nested patterns, computed keys, non-identifier rest.
    ///
    /// `text` reads the source of a span; string keys are copied from it.
    pub fn for_pattern<'s>(pat: &Pat, text: impl Fn(Span) -> &'s str) -> Option<PatternPlan> {
        match pat {
            Pat::Object(object) => plan_object(object, text),
            Pat::Array(array) => plan_array(array),
            _ => None,
        }
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().filter_map(|b| match b {
            Binding::Field { local, .. } => Some(local.as_str()),
            Binding::Rest { .. } => None,
        })
    }

    pub fn rest_name(&self) -> Option<&str> {
        self.bindings.iter().find_map(|b| match b {
            Binding::Rest { local } => Some(local.as_str()),
            Binding::Field { .. } => None,
        })
    }

    pub fn helpers(&self) -> impl Iterator<Item = Helper> + '_ {
        self.bindings.iter().map(|b| match b {
            Binding::Field { .. } => Helper::ToRef,
            Binding::Rest { .. } => Helper::CreatePropsRestProxy,
        })
    }

    /// The derived declarators appended after the original one.
    pub fn render<'s>(&self, temp: &str, text: impl Fn(Span) -> &'s str) -> String {
        let mut out = String::new();
        let mut seen: Vec<&FieldKey> = Vec::new();
        for binding in &self.bindings {
            match binding {
                Binding::Field {
                    local,
                    key,
                    default,
                } => {
                    out.push_str(&format!(
                        "\n,{local} = {}({temp}, {}",
                        Helper::ToRef.alias(),
                        key.as_argument()
                    ));
                    if let Some(default) = default {
                        out.push_str(", ");
                        out.push_str(text(*default));
                    }
                    out.push(')');
                    seen.push(key);
                }
                Binding::Rest { local } => {
                    let excluded = seen
                        .iter()
                        .map(|k| k.as_excluded())
                        .collect::<Vec<_>>()
                        .join(", ");
                    let proxy = format!(
                        "{}({temp}, [{excluded}])",
                        Helper::CreatePropsRestProxy.alias()
                    );
                    match self.kind {
                        PatternKind::Object => out.push_str(&format!("\n,{local} = {proxy}")),
                        PatternKind::Array => {
                            out.push_str(&format!("\n,{local} = Object.values({proxy})"))
                        }
                    }
                }
            }
        }
        out
    }
}

fn plan_object<'s>(object: &ObjectPat, text: impl Fn(Span) -> &'s str) -> Option<PatternPlan> {
    let mut bindings = Vec::new();
    for prop in &object.props {
        let binding = match prop {
            ObjectPatProp::Assign(assign) => Binding::Field {
                local: assign.key.id.sym.to_string(),
                key: FieldKey::Name(assign.key.id.sym.to_string()),
                default: assign.value.as_ref().map(|v| v.span()),
            },
            ObjectPatProp::KeyValue(kv) => {
                let key = match &kv.key {
                    PropName::Ident(ident) => FieldKey::Name(ident.sym.to_string()),
                    PropName::Str(s) => FieldKey::Literal(text(s.span).to_string()),
                    PropName::Num(n) => FieldKey::Name(text(n.span).to_string()),
                    _ => return None,
                };
                let (local, default) = simple_target(&kv.value)?;
                Binding::Field {
                    local,
                    key,
                    default,
                }
            }
            ObjectPatProp::Rest(rest) => Binding::Rest {
                local: ident_name(&rest.arg)?,
            },
        };
        bindings.push(binding);
    }
    Some(PatternPlan {
        kind: PatternKind::Object,
        span: object.span,
        bindings,
    })
}

fn plan_array(array: &ArrayPat) -> Option<PatternPlan> {
    let mut bindings = Vec::new();
    for (index, elem) in array.elems.iter().enumerate() {
        // Holes still take up an index.
        let Some(elem) = elem else {
            continue;
        };
        let binding = match elem {
            Pat::Rest(rest) => Binding::Rest {
                local: ident_name(&rest.arg)?,
            },
            other => {
                let (local, default) = simple_target(other)?;
                Binding::Field {
                    local,
                    key: FieldKey::Index(index),
                    default,
                }
            }
        };
        bindings.push(binding);
    }
    Some(PatternPlan {
        kind: PatternKind::Array,
        span: array.span,
        bindings,
    })
}

/// `a` or `a = default`.
fn simple_target(pat: &Pat) -> Option<(String, Option<Span>)> {
    match pat {
        Pat::Ident(binding) => Some((binding.id.sym.to_string(), None)),
        Pat::Assign(assign) => Some((ident_name(&assign.left)?, Some(assign.right.span()))),
        _ => None,
    }
}

fn ident_name(pat: &Pat) -> Option<String> {
    match pat {
        Pat::Ident(binding) => Some(binding.id.sym.to_string()),
        _ => None,
    }
}
