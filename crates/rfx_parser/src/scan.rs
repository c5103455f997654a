//! Text scan deciding whether a unit can contain any sigil construct.
//!
//! Runs before parsing so that files without a single `$` in code are
//! passed through untouched, without paying for (or failing on) a parse.
//! When unsure the scan answers `true`; a false positive only costs a parse.

use rfx_ast::SIGIL;

/// Words after which a `/` opens a regular expression rather than dividing.
const OPERAND_KEYWORDS: &[&[u8]] = &[
    b"return",
    b"typeof",
    b"instanceof",
    b"case",
    b"do",
    b"else",
    b"in",
    b"of",
    b"new",
    b"delete",
    b"void",
    b"throw",
    b"yield",
    b"await",
];

/// Returns true if the sigil occurs anywhere outside comments, string
/// literals and the literal text of template strings.
pub fn contains_sigil(source: &str) -> bool {
    if !source.contains(SIGIL) {
        return false;
    }
    Scanner::new(source.as_bytes()).find_sigil()
}

/// Every delimiter the scanner cares about is ASCII, so it walks bytes.
struct Scanner<'a> {
    src: &'a [u8],
    pos: usize,
    /// Brace depth of each open `${ ... }`, innermost last.
    interpolations: Vec<u32>,
    /// A `/` here starts a regex literal.
    expect_operand: bool,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a [u8]) -> Self {
        Self {
            src,
            pos: 0,
            interpolations: Vec::new(),
            expect_operand: true,
        }
    }

    fn peek(&self, ahead: usize) -> Option<u8> {
        self.src.get(self.pos + ahead).copied()
    }

    fn find_sigil(&mut self) -> bool {
        while let Some(b) = self.peek(0) {
            match b {
                b'$' => return true,
                b'/' if self.peek(1) == Some(b'/') => self.skip_line_comment(),
                b'/' if self.peek(1) == Some(b'*') => self.skip_block_comment(),
                b'/' if self.expect_operand => {
                    self.skip_regex();
                    self.expect_operand = false;
                }
                b'\'' | b'"' => {
                    self.skip_string(b);
                    self.expect_operand = false;
                }
                b'`' => {
                    self.pos += 1;
                    self.skip_template_text();
                }
                b'{' => {
                    if let Some(depth) = self.interpolations.last_mut() {
                        *depth += 1;
                    }
                    self.pos += 1;
                    self.expect_operand = true;
                }
                b'}' => {
                    self.pos += 1;
                    match self.interpolations.last().copied() {
                        Some(0) => {
                            self.interpolations.pop();
                            self.skip_template_text();
                        }
                        Some(_) => {
                            if let Some(depth) = self.interpolations.last_mut() {
                                *depth -= 1;
                            }
                            self.expect_operand = true;
                        }
                        None => self.expect_operand = true,
                    }
                }
                b')' | b']' => {
                    self.pos += 1;
                    self.expect_operand = false;
                }
                b if b.is_ascii_whitespace() => self.pos += 1,
                b if is_word_byte(b) => {
                    let start = self.pos;
                    while self.peek(0).is_some_and(is_word_byte) {
                        self.pos += 1;
                    }
                    let word = &self.src[start..self.pos];
                    self.expect_operand = OPERAND_KEYWORDS.contains(&word);
                }
                _ => {
                    self.pos += 1;
                    self.expect_operand = true;
                }
            }
        }
        false
    }

    fn skip_line_comment(&mut self) {
        while self.peek(0).is_some_and(|b| b != b'\n') {
            self.pos += 1;
        }
    }

    fn skip_block_comment(&mut self) {
        self.pos += 2;
        while let Some(b) = self.peek(0) {
            if b == b'*' && self.peek(1) == Some(b'/') {
                self.pos += 2;
                return;
            }
            self.pos += 1;
        }
    }

    /// Quoted strings stop at a raw newline too, so an apostrophe in JSX
    /// text cannot swallow the rest of the file.
    fn skip_string(&mut self, quote: u8) {
        self.pos += 1;
        while let Some(b) = self.peek(0) {
            match b {
                b'\\' => self.pos += 2,
                b'\n' => return,
                _ if b == quote => {
                    self.pos += 1;
                    return;
                }
                _ => self.pos += 1,
            }
        }
    }

    /// Stops short of any `$` in the body (`/^a$/`, or a `</tag>` misread
    /// as a regex) and lets the caller report it.
    fn skip_regex(&mut self) {
        self.pos += 1;
        let mut in_class = false;
        while let Some(b) = self.peek(0) {
            match b {
                b'\\' => self.pos += 2,
                b'\n' | b'$' => return,
                b'[' => {
                    in_class = true;
                    self.pos += 1;
                }
                b']' => {
                    in_class = false;
                    self.pos += 1;
                }
                b'/' if !in_class => {
                    self.pos += 1;
                    while self.peek(0).is_some_and(is_word_byte) {
                        self.pos += 1;
                    }
                    return;
                }
                _ => self.pos += 1,
            }
        }
    }

    /// Literal text of a template, up to its closing backtick or the next
    /// `${`. The `$` of `${` is not a sigil.
    fn skip_template_text(&mut self) {
        while let Some(b) = self.peek(0) {
            match b {
                b'\\' => self.pos += 2,
                b'`' => {
                    self.pos += 1;
                    self.expect_operand = false;
                    return;
                }
                b'$' if self.peek(1) == Some(b'{') => {
                    self.pos += 2;
                    self.interpolations.push(0);
                    self.expect_operand = true;
                    return;
                }
                _ => self.pos += 1,
            }
        }
    }
}

/// Identifier and number bytes, minus the sigil. Non-ASCII bytes belong to
/// identifiers.
fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_code_has_no_sigil() {
        assert!(!contains_sigil("const a = ref(1)\nwatch(a, () => {})"));
    }

    #[test]
    fn sigil_in_code_is_found() {
        assert!(contains_sigil("let a = $ref(1)"));
        assert!(contains_sigil("console.log$(a)"));
    }

    #[test]
    fn sigil_in_strings_and_comments_is_ignored() {
        assert!(!contains_sigil("const price = '$10' // costs $"));
        assert!(!contains_sigil("/* $ref */ const a = \"$\""));
    }

    #[test]
    fn apostrophes_do_not_cross_lines() {
        assert!(contains_sigil("const el = <p>don't</p>\nlet a = $ref(0)"));
    }

    #[test]
    fn template_interpolations_are_code() {
        assert!(!contains_sigil("const s = `total: ${total} $`"));
        assert!(contains_sigil("const s = `total: ${$sum(a)}`"));
        assert!(contains_sigil("const s = `${ {a: $x()}.a }`"));
    }

    #[test]
    fn regex_literals_do_not_hide_code() {
        assert!(contains_sigil("const re = /'/g; let a = $ref(0)"));
        assert!(contains_sigil("const url = /https?:\\/\\//; let a = $ref(0)"));
        assert!(contains_sigil("if (ok) return /\"/.test(s) && $use()"));
    }

    #[test]
    fn division_is_not_a_regex() {
        assert!(!contains_sigil("const half = total / 2 // $ note"));
        assert!(!contains_sigil("const r = (a) / b / '$'"));
    }
}
