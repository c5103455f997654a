use anyhow::Result;
use rfx_ast::Lang;
use swc_common::{comments::SingleThreadedComments, sync::Lrc, BytePos, FileName, SourceFile, SourceMap, Spanned};
use swc_ecma_ast::{EsVersion, Expr, Module};
use swc_ecma_parser::{error::Error, EsSyntax, PResult, Syntax, TsSyntax};

/// A parsed unit together with what is needed to map its spans back to text.
pub struct Parsed<T> {
    pub node: T,
    pub comments: SingleThreadedComments,
    pub source_map: Lrc<SourceMap>,
    /// Position of the first byte of the parsed text. Span positions are
    /// relative to this, not to zero.
    pub start_pos: BytePos,
}

pub type ParseResult = Parsed<Module>;
pub type ExprParseResult = Parsed<Box<Expr>>;

impl<T> Parsed<T> {
    /// Byte offset into the parsed text of a span position.
    pub fn offset(&self, pos: BytePos) -> usize {
        (pos.0 - self.start_pos.0) as usize
    }
}

/// Parse one script region as an ES module.
pub fn parse_script(source: &str, filename: &str, lang: Lang) -> Result<ParseResult> {
    parse_with(source, filename, lang, |fm, syntax, comments, recovered| {
        swc_ecma_parser::parse_file_as_module(
            fm,
            syntax,
            EsVersion::latest(),
            Some(comments),
            recovered,
        )
    })
}

/// Parse a bare expression, e.g. a template interpolation.
pub fn parse_expression(source: &str, filename: &str, lang: Lang) -> Result<ExprParseResult> {
    parse_with(source, filename, lang, |fm, syntax, comments, recovered| {
        swc_ecma_parser::parse_file_as_expr(
            fm,
            syntax,
            EsVersion::latest(),
            Some(comments),
            recovered,
        )
    })
}

fn parse_with<T>(
    source: &str,
    filename: &str,
    lang: Lang,
    parse: impl FnOnce(&SourceFile, Syntax, &SingleThreadedComments, &mut Vec<Error>) -> PResult<T>,
) -> Result<Parsed<T>> {
    let source_map: Lrc<SourceMap> = Default::default();
    let source_file = source_map.new_source_file(
        Lrc::new(FileName::Custom(filename.to_string())),
        source.to_string(),
    );

    let comments = SingleThreadedComments::default();
    let mut recovered = vec![];

    let node = parse(&source_file, syntax_for(lang), &comments, &mut recovered)
        .map_err(|e| describe_error(&source_map, filename, &e))?;

    for error in &recovered {
        tracing::debug!(
            filename,
            message = %error.kind().msg(),
            "recovered parse error"
        );
    }

    Ok(Parsed {
        node,
        comments,
        start_pos: source_file.start_pos,
        source_map,
    })
}

fn syntax_for(lang: Lang) -> Syntax {
    match lang {
        Lang::Ts | Lang::Tsx => Syntax::Typescript(TsSyntax {
            tsx: lang == Lang::Tsx,
            decorators: true,
            ..Default::default()
        }),
        Lang::Js | Lang::Jsx => Syntax::Es(EsSyntax {
            jsx: lang == Lang::Jsx,
            decorators: true,
            ..Default::default()
        }),
    }
}

fn describe_error(source_map: &SourceMap, filename: &str, error: &Error) -> anyhow::Error {
    let loc = source_map.lookup_char_pos(error.span().lo);
    anyhow::anyhow!(
        "failed to parse {filename}:{}:{}: {}",
        loc.line,
        loc.col.0 + 1,
        error.kind().msg()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_are_relative_to_the_region() {
        let parsed = parse_script("let a = 1", "a.ts", Lang::Ts).unwrap();
        assert_eq!(parsed.offset(parsed.start_pos), 0);
        assert_eq!(parsed.node.body.len(), 1);
    }

    #[test]
    fn jsx_only_in_jsx_dialects() {
        assert!(parse_script("const a = <div />", "a.tsx", Lang::Tsx).is_ok());
        assert!(parse_script("const a = <div />", "a.ts", Lang::Ts).is_err());
    }

    #[test]
    fn parse_error_names_the_location() {
        let err = parse_script("let = ;", "broken.ts", Lang::Ts)
            .err()
            .expect("should fail");
        let message = err.to_string();
        assert!(message.contains("broken.ts:1:"), "{message}");
    }

    #[test]
    fn parses_bare_expressions() {
        let parsed = parse_expression("count + 1", "expr.ts", Lang::Ts).unwrap();
        assert!(matches!(*parsed.node, Expr::Bin(_)));
    }
}
