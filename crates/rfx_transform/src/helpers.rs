//! Runtime helper imports and the per-document session.

use std::collections::BTreeSet;

use rfx_ast::{Options, HELPER_PREFIX};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Helper {
    ToRef,
    CreatePropsRestProxy,
}

impl Helper {
    pub const ALL: [Helper; 2] = [Helper::ToRef, Helper::CreatePropsRestProxy];

    /// Export name in the runtime module.
    pub fn export_name(self) -> &'static str {
        match self {
            Helper::ToRef => "toRef",
            Helper::CreatePropsRestProxy => "createPropsRestProxy",
        }
    }

    /// Local alias the transform calls it by.
    pub fn alias(self) -> String {
        format!("{HELPER_PREFIX}{}", self.export_name())
    }
}

/// State shared by every region of one document: temp numbering and the
/// helpers already imported.
#[derive(Debug, Default)]
pub struct Session {
    next_temp: usize,
    imported: BTreeSet<Helper>,
}

impl Session {
    pub fn fresh_temp(&mut self) -> String {
        let n = self.next_temp;
        self.next_temp += 1;
        format!("{HELPER_PREFIX}ref{n}")
    }

    /// Import statement for the requested helpers not yet imported by an
    /// earlier region.
    pub fn import_statement(
        &mut self,
        requested: &BTreeSet<Helper>,
        runtime_module: &str,
    ) -> Option<String> {
        let new: Vec<Helper> = requested.difference(&self.imported).copied().collect();
        if new.is_empty() {
            return None;
        }
        self.imported.extend(new.iter().copied());
        let specifiers = new
            .iter()
            .map(|h| format!("{} as {}", h.export_name(), h.alias()))
            .collect::<Vec<_>>()
            .join(", ");
        Some(format!(
            "import {{ {specifiers} }} from '{runtime_module}';\n"
        ))
    }
}

/// Ambient signatures of the wrap marker and helper primitives, for type
/// checkers that see the transformed text without the runtime imports.
pub fn helper_declarations(options: &Options) -> String {
    let module = &options.runtime_module;
    let wrap = &options.wrap_fn;
    let to_ref = Helper::ToRef.alias();
    let rest = Helper::CreatePropsRestProxy.alias();
    format!(
        "declare function {wrap}<T>(value: T): import('{module}').Ref<T>;\n\
         declare function {to_ref}<T extends object, K extends keyof T>(source: T, key: K, defaultValue?: T[K]): import('{module}').Ref<T[K]>;\n\
         declare function {rest}<T extends object>(source: T, excludedKeys: string[]): Record<string, unknown>;\n"
    )
}
