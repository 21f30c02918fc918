//! Native header generation.
//!
//! Native methods and classes are bound by index from the host side. The
//! header lists one `const int` per native method, class and package,
//! plus optional constants for interned strings and public names.

use rustc_hash::FxHashSet;

use crate::bytecode::{AbcModule, ConstantKind, read_u30};

/// How many native methods, classes and packages the header declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeCounts {
    pub methods: u32,
    pub classes: u32,
    /// Starts at 1: the global script always counts.
    pub packages: u32,
}

impl Default for NativeCounts {
    fn default() -> Self {
        Self {
            methods: 0,
            classes: 0,
            packages: 1,
        }
    }
}

/// A qualified name turned into a C identifier: `.`, `/`, `:`, `|` and
/// `$` become `_`.
pub fn clean_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '.' | '/' | ':' | '|' | '$' => '_',
            c => c,
        })
        .collect()
}

/// Keep only identifier characters.
fn identifier_chars(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

#[derive(Debug, Default)]
pub(super) struct NativeHeader {
    lines: Vec<String>,
    methods: u32,
    classes: u32,
}

impl NativeHeader {
    pub(super) fn native_method(&mut self, debug_name: &str, index: u32) {
        self.lines
            .push(format!("const int {} = {index};", clean_name(debug_name)));
        self.methods = self.methods.max(index + 1);
    }

    pub(super) fn native_class(&mut self, name: &str, index: u32) {
        self.lines
            .push(format!("const int abcclass_{} = {index};", clean_name(name)));
        self.classes = self.classes.max(index + 1);
    }

    pub(super) fn counts(&self, module: &AbcModule) -> NativeCounts {
        let packages = package_names(module)
            .map(|(index, _)| index as u32 + 1)
            .fold(1, u32::max);
        NativeCounts {
            methods: self.methods,
            classes: self.classes,
            packages,
        }
    }

    pub(super) fn render(&self, module: &AbcModule, pool_constants: bool) -> String {
        let mut out = self.lines.clone();
        if pool_constants {
            pool_lines(module, &mut out);
        }
        for (index, name) in package_names(module) {
            out.push(format!("const int abcpackage_{} = {index};", clean_name(name)));
        }
        out.join("\n")
    }
}

/// Scripts with a real package name; `""` and `"$"` are skipped.
fn package_names(module: &AbcModule) -> impl Iterator<Item = (usize, &str)> {
    module
        .script_names()
        .iter()
        .enumerate()
        .filter(|(_, name)| name.len() > 1)
        .map(|(index, name)| (index, name.as_str()))
}

fn pool_lines(module: &AbcModule, out: &mut Vec<String>) {
    let pools = &module.pools;

    let mut seen = FxHashSet::default();
    for index in 1..=pools.utf8.len() as u32 {
        let Some(text) = pools.utf8_at(index) else {
            continue;
        };
        let ident = identifier_chars(text);
        if !ident.is_empty() && seen.insert(ident.clone()) {
            out.push(format!("const int abcstr_{ident} = {index};"));
        }
    }

    for (i, entry) in pools.multinames.entries().enumerate() {
        if let Some(ident) = public_name(module, entry) {
            out.push(format!("const int abcname_{ident} = {};", i + 1));
        }
    }
}

/// `uri_name` for a QName in a public or package namespace.
fn public_name(module: &AbcModule, entry: &[u8]) -> Option<String> {
    let pools = &module.pools;
    let (&kind, rest) = entry.split_first()?;
    if kind != u8::from(ConstantKind::QName) {
        return None;
    }
    let mut pos = 0;
    let ns = read_u30(rest, &mut pos)?;
    let name = read_u30(rest, &mut pos)?;

    let (&ns_kind, ns_rest) = pools.namespaces.get(ns)?.split_first()?;
    if ns_kind != u8::from(ConstantKind::Namespace)
        && ns_kind != u8::from(ConstantKind::PackageNamespace)
    {
        return None;
    }
    let mut pos = 0;
    let uri = read_u30(ns_rest, &mut pos)?;
    Some(format!(
        "{}_{}",
        identifier_chars(pools.utf8_at(uri)?),
        identifier_chars(pools.utf8_at(name)?)
    ))
}
