//! Whole-document driver: regions, sessions, and the final splice.

use rfx_ast::{is_component_path, Lang, Options, ScriptRegion};
use rfx_parser::{contains_sigil, parse_expression, parse_script, script_regions};
use serde::Serialize;
use swc_ecma_visit::VisitWith;

use crate::edit::{Edit, EditSet, Mapping};
use crate::error::TransformError;
use crate::helpers::{helper_declarations, Session};
use crate::scope::FrameKind;
use crate::source_map;
use crate::walk::Walker;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformOutput {
    pub code: String,
    /// The applied edits, ordered by position.
    pub edits: Vec<Edit>,
    #[serde(skip)]
    pub mappings: Vec<Mapping>,
    /// Source map JSON, when requested and something changed.
    pub map: Option<String>,
    /// Unwrap bindings of the top-level scope, for transforming expressions
    /// that run against it (template interpolations).
    pub unwrap_bindings: Vec<String>,
}

impl TransformOutput {
    fn unchanged(source: &str) -> Self {
        Self {
            code: source.to_string(),
            edits: Vec::new(),
            mappings: Vec::new(),
            map: None,
            unwrap_bindings: Vec::new(),
        }
    }

    pub fn is_changed(&self) -> bool {
        !self.edits.is_empty()
    }
}

/// Transform one file with `options`.
pub fn transform(
    source: &str,
    filename: &str,
    options: &Options,
) -> Result<TransformOutput, TransformError> {
    Transformer::new(options.clone()).transform_file(source, filename)
}

pub struct Transformer {
    options: Options,
    ignore: Vec<String>,
}

impl Transformer {
    pub fn new(options: Options) -> Self {
        let ignore = options.ignore_list();
        Self { options, ignore }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Script files are one region; components are split into their
    /// `<script>` blocks.
    pub fn transform_file(
        &self,
        source: &str,
        filename: &str,
    ) -> Result<TransformOutput, TransformError> {
        let regions = if is_component_path(filename) {
            script_regions(source)
        } else {
            let lang = Lang::from_path(filename)
                .ok_or_else(|| TransformError::UnsupportedFile(filename.to_string()))?;
            vec![ScriptRegion::whole(source, lang)]
        };
        self.transform_regions(source, filename, &regions)
    }

    /// Transform each region independently and splice all edits into the
    /// document at once. Temp numbering and helper imports are shared
    /// across the regions.
    #[tracing::instrument(level = "debug", skip_all, fields(filename = %filename, regions = regions.len()))]
    pub fn transform_regions(
        &self,
        source: &str,
        filename: &str,
        regions: &[ScriptRegion],
    ) -> Result<TransformOutput, TransformError> {
        let mut session = Session::default();
        let mut edits = EditSet::new();
        let mut unwrap_bindings = Vec::new();
        let mut last_changed = None;

        for region in regions {
            let text = source
                .get(region.start..region.end)
                .ok_or(TransformError::RegionOutOfBounds {
                    start: region.start,
                    end: region.end,
                })?;
            if !contains_sigil(text) {
                tracing::trace!(start = region.start, "no sigil in region, skipping");
                continue;
            }

            let parsed = parse_script(text, filename, region.lang)?;
            let mut walker = Walker::new(
                text,
                parsed.start_pos,
                region.start,
                FrameKind::Program,
                &self.options,
                &self.ignore,
                &mut session,
            );
            parsed.node.visit_with(&mut walker);
            let output = walker.finish();

            if !output.edits.is_empty() {
                last_changed = Some(region.end);
            }
            edits.extend(output.edits);
            unwrap_bindings.extend(output.root_unwraps);
        }

        if self.options.declarations {
            if let Some(end) = last_changed {
                edits.insert_after(end, format!("\n{}", helper_declarations(&self.options)));
            }
        }

        let mut output = self.splice(source, filename, edits)?;
        output.unwrap_bindings = unwrap_bindings;
        Ok(output)
    }

    /// Transform a standalone expression, such as a template interpolation,
    /// against unwrap bindings declared elsewhere.
    #[tracing::instrument(level = "debug", skip_all, fields(filename = %filename))]
    pub fn transform_expression(
        &self,
        source: &str,
        filename: &str,
        lang: Lang,
        unwraps: &[String],
    ) -> Result<TransformOutput, TransformError> {
        if unwraps.is_empty() && !contains_sigil(source) {
            return Ok(TransformOutput::unchanged(source));
        }

        let parsed = parse_expression(source, filename, lang)?;
        let mut session = Session::default();
        let mut walker = Walker::new(
            source,
            parsed.start_pos,
            0,
            FrameKind::Expression,
            &self.options,
            &self.ignore,
            &mut session,
        );
        walker.declare_root_unwraps(unwraps);
        parsed.node.visit_with(&mut walker);
        let output = walker.finish();

        let mut result = self.splice(source, filename, output.edits)?;
        result.unwrap_bindings = unwraps.to_vec();
        Ok(result)
    }

    fn splice(
        &self,
        source: &str,
        filename: &str,
        edits: EditSet,
    ) -> Result<TransformOutput, TransformError> {
        if edits.is_empty() {
            return Ok(TransformOutput::unchanged(source));
        }
        let spliced = edits.apply(source)?;
        tracing::debug!(edits = edits.len(), "applied edits");

        let map = if self.options.source_map {
            Some(source_map::to_json(filename, source, &spliced.mappings)?)
        } else {
            None
        };
        Ok(TransformOutput {
            code: spliced.code,
            edits: edits.sorted(),
            mappings: spliced.mappings,
            map,
            unwrap_bindings: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfx_ast::Resolution;

    fn rewrite(source: &str) -> String {
        transform(source, "test.ts", &Options::default()).unwrap().code
    }

    fn rewrite_tsx(source: &str) -> String {
        transform(source, "test.tsx", &Options::default()).unwrap().code
    }

    #[test]
    fn plain_code_is_untouched() {
        let source = "let a = 1\nconsole.log(a)\n";
        let output = transform(source, "test.ts", &Options::default()).unwrap();
        assert_eq!(output.code, source);
        assert!(output.edits.is_empty());
        assert!(!output.is_changed());
    }

    #[test]
    fn unwrap_declarator_reads_and_writes() {
        let input = "let count = $ref(0)\ncount++\nconsole.log(count)\n";
        assert_eq!(
            rewrite(input),
            "let count = ref(0)\ncount.value++\nconsole.log(count.value)\n"
        );
    }

    #[test]
    fn assignments_write_through_value() {
        let input = "let a = $ref(0)\na = 1\n;({ a } = { a: 2 })\nobj.a = a\n";
        assert_eq!(
            rewrite(input),
            "let a = ref(0)\na.value = 1\n;({ a: a.value } = { a: 2 })\nobj.a = a.value\n"
        );
    }

    #[test]
    fn explicit_reference_is_not_unwrapped() {
        let input = "let count = $ref(0)\nwatch($$(count))\n";
        assert_eq!(rewrite(input), "let count = ref(0)\nwatch((count))\n");
    }

    #[test]
    fn suffix_call_wraps_arguments() {
        let input = "let user = $ref({ name: 'a' })\nuse$(user.name)\nconsole.log(user.name)\n";
        assert_eq!(
            rewrite(input),
            "let user = ref({ name: 'a' })\nuse($$(user.name))\nconsole.log(user.value.name)\n"
        );
    }

    #[test]
    fn explicit_argument_is_not_wrapped_twice() {
        let input = "let a = $ref(0)\nwatch$($$(a))\n";
        assert_eq!(rewrite(input), "let a = ref(0)\nwatch((a))\n");
    }

    #[test]
    fn bare_sigil_call() {
        assert_eq!(rewrite("let a = $(b)\n"), "let a = ($$(b))\n");
    }

    #[test]
    fn ignored_macros_keep_their_sigil() {
        let input = "const props = $defineProps<{ a: string }>()\n";
        let output = transform(input, "test.ts", &Options::default()).unwrap();
        assert_eq!(output.code, input);
        assert!(output.edits.is_empty());
    }

    #[test]
    fn configured_ignore_names_are_not_triggers() {
        let options = Options {
            ignore: vec!["$foo".to_string()],
            ..Default::default()
        };
        let input = "const a = $foo()\nconsole.log(a)\n";
        assert_eq!(transform(input, "test.ts", &options).unwrap().code, input);
        assert_eq!(rewrite(input), "const a = foo()\nconsole.log(a.value)\n");
    }

    #[test]
    fn inner_declarations_shadow() {
        let input = "let count = $ref(0)\nfunction f(count) {\n  return count\n}\nconst g = () => count\n";
        assert_eq!(
            rewrite(input),
            "let count = ref(0)\nfunction f(count) {\n  return count\n}\nconst g = () => count.value\n"
        );
    }

    #[test]
    fn loop_bindings_shadow() {
        let input = "let i = $ref(0)\nfor (let i = 0; i < 3; i++) {}\nconsole.log(i)\n";
        assert_eq!(
            rewrite(input),
            "let i = ref(0)\nfor (let i = 0; i < 3; i++) {}\nconsole.log(i.value)\n"
        );
    }

    #[test]
    fn hoisted_use_depends_on_resolution() {
        let input = "function show() {\n  return count\n}\nlet count = $ref(0)\n";
        assert_eq!(
            rewrite(input),
            "function show() {\n  return count.value\n}\nlet count = ref(0)\n"
        );

        let counting = Options {
            resolution: Resolution::Counting,
            ..Default::default()
        };
        assert_eq!(
            transform(input, "test.ts", &counting).unwrap().code,
            "function show() {\n  return count\n}\nlet count = ref(0)\n"
        );
    }

    #[test]
    fn counting_shadows_despite_repeated_outer_unwraps() {
        let counting = Options {
            resolution: Resolution::Counting,
            ..Default::default()
        };
        let input = "let a = $ref(0)\n{\n  let a = $ref(1)\n  function f(a) { return a }\n}\n";
        assert_eq!(
            transform(input, "test.ts", &counting).unwrap().code,
            "let a = ref(0)\n{\n  let a = ref(1)\n  function f(a) { return a }\n}\n"
        );
    }

    #[test]
    fn shorthand_property_is_expanded() {
        assert_eq!(
            rewrite("let a = $ref(1)\nconst o = { a }\n"),
            "let a = ref(1)\nconst o = { a: a.value }\n"
        );
    }

    #[test]
    fn type_positions_are_skipped() {
        let input = "let a = $ref(0)\ntype T = typeof a\nconst b: typeof a = a\n";
        assert_eq!(
            rewrite(input),
            "let a = ref(0)\ntype T = typeof a\nconst b: typeof a = a.value\n"
        );
    }

    #[test]
    fn destructuring_expands_with_helpers() {
        let input = "const { x, y = 1 } = $useMouse()\nconsole.log(x)\n";
        assert_eq!(
            rewrite(input),
            "import { toRef as __rfx_toRef } from 'vue';\n\
             const __rfx_ref0 = useMouse()\n\
             ,x = __rfx_toRef(__rfx_ref0, 'x')\n\
             ,y = __rfx_toRef(__rfx_ref0, 'y', 1)\n\
             console.log(x.value)\n"
        );
    }

    #[test]
    fn unsupported_destructuring_is_left_alone() {
        let input = "const { a: { b } } = $use()\n";
        let output = transform(input, "test.ts", &Options::default()).unwrap();
        assert_eq!(output.code, input);
    }

    #[test]
    fn sigil_functions_wrap_returns() {
        assert_eq!(
            rewrite("function useDouble$() {\n  return [a, b]\n}\n"),
            "function useDouble() {\n  return [$$(a), $$(b)]\n}\n"
        );
        assert_eq!(
            rewrite("const use$ = () => ({ name })\n"),
            "const use = () => ({ name: $$(name) })\n"
        );
    }

    #[test]
    fn default_exported_sigil_function() {
        assert_eq!(
            rewrite("let x = $ref(0)\nexport default function use$() {\n  return x\n}\n"),
            "let x = ref(0)\nexport default function use() {\n  return $$(x)\n}\n"
        );
    }

    #[test]
    fn member_calls_keep_their_sigil_outside_declarators() {
        assert_eq!(
            rewrite("let a = $ref(0)\n$store.dispatch(a)\n$reset(a)\n"),
            "let a = ref(0)\n$store.dispatch(a.value)\nreset(a.value)\n"
        );
    }

    #[test]
    fn sigil_attribute_wraps_its_value() {
        let input = "let title = $ref('')\nconst el = <Input title$={title}>{title}</Input>\n";
        assert_eq!(
            rewrite_tsx(input),
            "let title = ref('')\nconst el = <Input title={$$(title)}>{title.value}</Input>\n"
        );
    }

    #[test]
    fn exempt_attribute_values_keep_the_reference() {
        let input = "let a = $ref(0)\nconst el = <Comp v-slot={a} />\n";
        assert_eq!(
            rewrite_tsx(input),
            "let a = ref(0)\nconst el = <Comp v-slot={a} />\n"
        );
    }

    #[test]
    fn component_regions_share_a_session() {
        let input = "<template><div>{{ $n }}</div></template>\n\
                     <script>\nconst { a } = $useA()\n</script>\n\
                     <script setup>\nconst { b } = $useB()\n</script>\n";
        let output = transform(input, "Comp.vue", &Options::default()).unwrap();
        assert!(output.code.starts_with("<template><div>{{ $n }}</div></template>\n"));
        assert_eq!(output.code.matches("import {").count(), 1);
        assert!(output.code.contains("const __rfx_ref0 = useA()\n,a = __rfx_toRef(__rfx_ref0, 'a')"));
        assert!(output.code.contains("const __rfx_ref1 = useB()\n,b = __rfx_toRef(__rfx_ref1, 'b')"));
        assert_eq!(output.unwrap_bindings, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn top_level_unwraps_feed_expressions() {
        let transformer = Transformer::new(Options::default());
        let script = transformer
            .transform_file(
                "let a = $ref(0)\nfunction f() {\n  let b = $ref(1)\n}\n",
                "test.ts",
            )
            .unwrap();
        assert_eq!(script.unwrap_bindings, vec!["a".to_string()]);

        let expr = transformer
            .transform_expression("a + other", "expr.ts", Lang::Ts, &script.unwrap_bindings)
            .unwrap();
        assert_eq!(expr.code, "a.value + other");
    }

    #[test]
    fn declarations_and_source_maps_on_request() {
        let options = Options {
            declarations: true,
            source_map: true,
            ..Default::default()
        };
        let output = transform("let a = $ref(0)\n", "test.ts", &options).unwrap();
        assert!(output.code.starts_with("let a = ref(0)\n\ndeclare function $$<T>"));
        assert!(output.map.is_some());
    }

    #[test]
    fn parse_failures_are_reported() {
        let err = transform("let $a = ;", "broken.ts", &Options::default()).unwrap_err();
        assert!(matches!(err, TransformError::Parse(_)));
        assert!(matches!(
            transform("x", "styles.css", &Options::default()),
            Err(TransformError::UnsupportedFile(_))
        ));
    }
}
