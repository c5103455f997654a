//! `<script>` region discovery for single-file components.
//!
//! Only the script blocks are returned; template and style blocks are never
//! handed to the transform. Each region is parsed and transformed on its own,
//! with its own offset base into the document.

use rfx_ast::{Lang, ScriptRegion};

const OPEN: &str = "<script";
const CLOSE: &str = "</script>";

/// Find every top-level `<script>` / `<script setup>` block in `source`.
///
/// Regions are returned in document order. An unterminated block, or a
/// block with an empty body, yields no region.
pub fn script_regions(source: &str) -> Vec<ScriptRegion> {
    let mut regions = Vec::new();
    let mut pos = 0;

    while let Some(found) = find_tag(source, pos) {
        let Some(tag_end) = source[found..].find('>').map(|i| found + i) else {
            break;
        };
        let attrs = &source[found + OPEN.len()..tag_end];
        let content_start = tag_end + 1;

        // `<script ... />` has no body.
        if attrs.trim_end().ends_with('/') {
            pos = content_start;
            continue;
        }

        let Some(content_end) = source[content_start..]
            .find(CLOSE)
            .map(|i| content_start + i)
        else {
            break;
        };

        if content_end > content_start {
            regions.push(ScriptRegion {
                start: content_start,
                end: content_end,
                lang: Lang::from_attr(attr_value(attrs, "lang")),
                setup: has_attr(attrs, "setup"),
            });
        }
        pos = content_end + CLOSE.len();
    }

    regions
}

/// Next `<script` opening tag at or after `from`, skipping HTML comments.
fn find_tag(source: &str, from: usize) -> Option<usize> {
    let mut pos = from;
    loop {
        let rest = &source[pos..];
        let tag = rest.find(OPEN)?;
        if let Some(comment) = rest.find("<!--") {
            if comment < tag {
                let end = rest[comment..].find("-->")?;
                pos += comment + end + 3;
                continue;
            }
        }
        let start = pos + tag;
        let next = source[start + OPEN.len()..].chars().next();
        if matches!(next, Some(c) if c == '>' || c.is_whitespace()) {
            return Some(start);
        }
        pos = start + OPEN.len();
    }
}

fn attributes(attrs: &str) -> impl Iterator<Item = (&str, Option<&str>)> {
    attrs.split_whitespace().map(|attr| match attr.split_once('=') {
        Some((name, value)) => (name, Some(value.trim_matches(|c: char| c == '"' || c == '\''))),
        None => (attr.trim_end_matches('/'), None),
    })
}

fn has_attr(attrs: &str, name: &str) -> bool {
    attributes(attrs).any(|(n, _)| n == name)
}

fn attr_value<'a>(attrs: &'a str, name: &str) -> Option<&'a str> {
    attributes(attrs).find(|(n, _)| *n == name).and_then(|(_, v)| v)
}
