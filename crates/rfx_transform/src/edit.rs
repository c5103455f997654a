//! Ranged text edits and the splice that applies them.
//!
//! Every rewrite in the transform is expressed as an `Edit` against the
//! original document; nothing is re-printed from the AST. `Emitter` is the
//! only place the rewriters talk to, and it converts SWC span positions of a
//! region into absolute document offsets.

use std::collections::BTreeMap;

use serde::Serialize;
use swc_common::BytePos;
use thiserror::Error;

/// One text edit at absolute byte offsets of the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Edit {
    /// Text attached in front of the character at `pos`.
    InsertBefore { pos: usize, text: String },
    /// Text attached behind the character before `pos`.
    InsertAfter { pos: usize, text: String },
    Remove { start: usize, end: usize },
    Overwrite { start: usize, end: usize, text: String },
}

impl Edit {
    pub fn start(&self) -> usize {
        match self {
            Edit::InsertBefore { pos, .. } | Edit::InsertAfter { pos, .. } => *pos,
            Edit::Remove { start, .. } | Edit::Overwrite { start, .. } => *start,
        }
    }

    fn range(&self) -> Option<(usize, usize)> {
        match self {
            Edit::Remove { start, end } | Edit::Overwrite { start, end, .. } => Some((*start, *end)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("edit {start}..{end} lies outside the source ({len} bytes)")]
    OutOfBounds { start: usize, end: usize, len: usize },
    #[error("edit position {pos} is not on a character boundary")]
    NotCharBoundary { pos: usize },
    #[error("edit ranges {first:?} and {second:?} overlap")]
    Overlap {
        first: (usize, usize),
        second: (usize, usize),
    },
    #[error("insertion at {pos} falls inside edited range {range:?}")]
    InsertInsideRange { pos: usize, range: (usize, usize) },
}

/// A generated position and the original offset it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Mapping {
    pub generated_line: u32,
    /// UTF-16 code units, as source maps count columns.
    pub generated_col: u32,
    pub original: usize,
}

/// Result of applying an `EditSet`.
#[derive(Debug, Clone)]
pub struct Spliced {
    pub code: String,
    pub mappings: Vec<Mapping>,
}

/// Ordered collection of edits for one document.
#[derive(Debug, Clone, Default)]
pub struct EditSet {
    edits: Vec<Edit>,
}

impl EditSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_before(&mut self, pos: usize, text: impl Into<String>) {
        let text = text.into();
        if !text.is_empty() {
            self.edits.push(Edit::InsertBefore { pos, text });
        }
    }

    pub fn insert_after(&mut self, pos: usize, text: impl Into<String>) {
        let text = text.into();
        if !text.is_empty() {
            self.edits.push(Edit::InsertAfter { pos, text });
        }
    }

    pub fn remove(&mut self, start: usize, end: usize) {
        if start < end {
            self.edits.push(Edit::Remove { start, end });
        }
    }

    pub fn overwrite(&mut self, start: usize, end: usize, text: impl Into<String>) {
        if start < end {
            self.edits.push(Edit::Overwrite {
                start,
                end,
                text: text.into(),
            });
        } else {
            self.insert_before(start, text);
        }
    }

    pub fn extend(&mut self, other: EditSet) {
        self.edits.extend(other.edits);
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    /// Edits ordered by position; edits at the same position keep the
    /// order they were issued in.
    pub fn sorted(&self) -> Vec<Edit> {
        let mut edits = self.edits.clone();
        edits.sort_by_key(Edit::start);
        edits
    }

    /// Splice all edits into `source`.
    ///
    /// At a single position, insert-after texts come first, then
    /// insert-before texts, then the removed or overwritten range. Fails
    /// without producing output if any edit is out of bounds, splits a
    /// character, overlaps another range, or inserts inside a range.
    pub fn apply(&self, source: &str) -> Result<Spliced, EditError> {
        let len = source.len();
        let mut ranges: Vec<(usize, usize, Option<&str>)> = Vec::new();
        let mut inserts: BTreeMap<usize, (Vec<&str>, Vec<&str>)> = BTreeMap::new();

        for edit in &self.edits {
            let (start, end) = edit.range().unwrap_or((edit.start(), edit.start()));
            if start > end || end > len {
                return Err(EditError::OutOfBounds { start, end, len });
            }
            for pos in [start, end] {
                if !source.is_char_boundary(pos) {
                    return Err(EditError::NotCharBoundary { pos });
                }
            }
            match edit {
                Edit::InsertAfter { pos, text } => inserts.entry(*pos).or_default().0.push(text.as_str()),
                Edit::InsertBefore { pos, text } => inserts.entry(*pos).or_default().1.push(text.as_str()),
                Edit::Remove { start, end } => ranges.push((*start, *end, None)),
                Edit::Overwrite { start, end, text } => ranges.push((*start, *end, Some(text.as_str()))),
            }
        }

        ranges.sort_by_key(|(start, _, _)| *start);
        for pair in ranges.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if a.1 > b.0 {
                return Err(EditError::Overlap {
                    first: (a.0, a.1),
                    second: (b.0, b.1),
                });
            }
        }
        for &pos in inserts.keys() {
            if let Some(&(start, end, _)) = ranges.iter().find(|(s, e, _)| *s < pos && pos < *e) {
                return Err(EditError::InsertInsideRange {
                    pos,
                    range: (start, end),
                });
            }
        }

        let mut out = Splicer::with_capacity(len + len / 8);
        let mut cursor = 0;
        let mut pending_inserts = inserts.into_iter().peekable();
        let mut pending_ranges = ranges.into_iter().peekable();

        loop {
            let next_insert = pending_inserts.peek().map(|(pos, _)| *pos);
            let next_range = pending_ranges.peek().map(|(start, _, _)| *start);
            let Some(pos) = [next_insert, next_range].into_iter().flatten().min() else {
                break;
            };

            out.copy(source, cursor, pos);
            cursor = cursor.max(pos);

            if next_insert == Some(pos) {
                if let Some((_, (after, before))) = pending_inserts.next() {
                    for text in after.into_iter().chain(before) {
                        out.emit(text);
                    }
                }
            }
            if next_range == Some(pos) {
                if let Some((_, end, text)) = pending_ranges.next() {
                    if let Some(text) = text {
                        out.emit(text);
                    }
                    cursor = end;
                }
            }
        }
        out.copy(source, cursor, len);

        Ok(Spliced {
            code: out.code,
            mappings: out.mappings,
        })
    }
}

/// Output buffer that tracks the generated line/column while splicing.
struct Splicer {
    code: String,
    mappings: Vec<Mapping>,
    line: u32,
    col: u32,
}

impl Splicer {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            code: String::with_capacity(capacity),
            mappings: Vec::new(),
            line: 0,
            col: 0,
        }
    }

    /// Copy an untouched stretch of the original, mapping its start and the
    /// start of every line inside it.
    fn copy(&mut self, source: &str, start: usize, end: usize) {
        if start >= end {
            return;
        }
        self.mark(start);
        for (i, c) in source[start..end].char_indices() {
            self.code.push(c);
            if c == '\n' {
                self.line += 1;
                self.col = 0;
                if start + i + 1 < end {
                    self.mark(start + i + 1);
                }
            } else {
                self.col += c.len_utf16() as u32;
            }
        }
    }

    fn emit(&mut self, text: &str) {
        for c in text.chars() {
            if c == '\n' {
                self.line += 1;
                self.col = 0;
            } else {
                self.col += c.len_utf16() as u32;
            }
        }
        self.code.push_str(text);
    }

    fn mark(&mut self, original: usize) {
        self.mappings.push(Mapping {
            generated_line: self.line,
            generated_col: self.col,
            original,
        });
    }
}

/// Edit sink for one region.
///
/// Positions come in as SWC `BytePos` values of the region's own source
/// file and go out as absolute offsets of the document.
pub struct Emitter {
    base: usize,
    start_pos: BytePos,
    edits: EditSet,
}

impl Emitter {
    pub fn new(base: usize, start_pos: BytePos) -> Self {
        Self {
            base,
            start_pos,
            edits: EditSet::new(),
        }
    }

    pub fn offset(&self, pos: BytePos) -> usize {
        self.base + (pos.0 - self.start_pos.0) as usize
    }

    pub fn insert_before(&mut self, pos: BytePos, text: impl Into<String>) {
        let pos = self.offset(pos);
        self.edits.insert_before(pos, text);
    }

    pub fn insert_after(&mut self, pos: BytePos, text: impl Into<String>) {
        let pos = self.offset(pos);
        self.edits.insert_after(pos, text);
    }

    pub fn remove(&mut self, start: BytePos, end: BytePos) {
        let (start, end) = (self.offset(start), self.offset(end));
        self.edits.remove(start, end);
    }

    pub fn overwrite(&mut self, start: BytePos, end: BytePos, text: impl Into<String>) {
        let (start, end) = (self.offset(start), self.offset(end));
        self.edits.overwrite(start, end, text);
    }

    /// Text placed ahead of everything else at the region start.
    pub fn prepend(&mut self, text: impl Into<String>) {
        self.edits.insert_after(self.base, text);
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn finish(self) -> EditSet {
        self.edits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_set_is_identity() {
        let spliced = EditSet::new().apply("let a = 1\n").unwrap();
        assert_eq!(spliced.code, "let a = 1\n");
    }

    #[test]
    fn inserts_removes_and_overwrites_compose() {
        let source = "let $a = $ref(1)";
        let mut edits = EditSet::new();
        edits.remove(9, 10);
        edits.insert_after(6, ".x");
        edits.overwrite(4, 6, "b");
        let spliced = edits.apply(source).unwrap();
        assert_eq!(spliced.code, "let b.x = ref(1)");
    }

    #[test]
    fn same_position_orders_after_then_before() {
        let mut edits = EditSet::new();
        edits.insert_before(3, "[");
        edits.insert_after(3, ".value");
        edits.insert_before(3, "(");
        let spliced = edits.apply("abcdef").unwrap();
        assert_eq!(spliced.code, "abc.value[(def");
    }

    #[test]
    fn insertion_at_range_edges_survives() {
        let mut edits = EditSet::new();
        edits.remove(0, 1);
        edits.insert_before(0, "$$(");
        edits.insert_after(4, ")");
        let spliced = edits.apply("$foo").unwrap();
        assert_eq!(spliced.code, "$$(foo)");
    }

    #[test]
    fn overlapping_ranges_are_rejected() {
        let mut edits = EditSet::new();
        edits.remove(0, 3);
        edits.overwrite(2, 4, "x");
        assert!(matches!(
            edits.apply("abcdef"),
            Err(EditError::Overlap { .. })
        ));
    }

    #[test]
    fn insertion_inside_range_is_rejected() {
        let mut edits = EditSet::new();
        edits.overwrite(0, 4, "tmp");
        edits.insert_after(2, ".value");
        assert_eq!(
            edits.apply("abcdef").err(),
            Some(EditError::InsertInsideRange {
                pos: 2,
                range: (0, 4)
            })
        );
    }

    #[test]
    fn out_of_bounds_and_split_chars_are_rejected() {
        let mut edits = EditSet::new();
        edits.remove(2, 10);
        assert!(matches!(
            edits.apply("abc"),
            Err(EditError::OutOfBounds { .. })
        ));

        let mut edits = EditSet::new();
        edits.insert_before(1, "x");
        assert_eq!(
            edits.apply("é").err(),
            Some(EditError::NotCharBoundary { pos: 1 })
        );
    }

    #[test]
    fn mappings_follow_lines_of_untouched_text() {
        let mut edits = EditSet::new();
        edits.insert_before(0, "import x\n");
        let spliced = edits.apply("a\nb").unwrap();
        assert_eq!(spliced.code, "import x\na\nb");
        assert_eq!(
            spliced.mappings,
            vec![
                Mapping {
                    generated_line: 1,
                    generated_col: 0,
                    original: 0
                },
                Mapping {
                    generated_line: 2,
                    generated_col: 0,
                    original: 2
                },
            ]
        );
    }

    #[test]
    fn emitter_translates_region_positions() {
        let mut emitter = Emitter::new(10, BytePos(1));
        emitter.insert_after(BytePos(4), ".value");
        emitter.prepend("import a\n");
        let edits = emitter.finish().sorted();
        assert_eq!(
            edits,
            vec![
                Edit::InsertAfter {
                    pos: 10,
                    text: "import a\n".into()
                },
                Edit::InsertAfter {
                    pos: 13,
                    text: ".value".into()
                },
            ]
        );
    }
}
