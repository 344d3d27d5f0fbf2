//! The semantic pass of the front-end.
//!
//! swc parses and lowers TypeScript but does not type-check it, so the
//! program runs its own checks over the resolved syntax trees: unresolved
//! module specifiers, imports of members a module does not export, and value
//! references that bind to nothing in scope.

use super::emitter::apply;
use super::program::Program;
use super::resolution::Resolution;
use super::source_cache::ParsedSource;
use crate::diagnostic::RawDiagnostic;
use ahash::AHashSet;
use swc_core::common::{Mark, Span};
use swc_core::ecma::ast::*;
use swc_core::ecma::transforms::base::resolver;
use swc_core::ecma::visit::{Visit, VisitWith};

pub const CANNOT_FIND_MODULE: u32 = 2307;
pub const NO_EXPORTED_MEMBER: u32 = 2305;
pub const NO_DEFAULT_EXPORT: u32 = 1192;
pub const NOT_A_MODULE: u32 = 2306;
pub const CANNOT_FIND_NAME: u32 = 2304;

/// Values every program can reference without a declaration file.
const BUILTIN_GLOBALS: &[&str] = &[
    "globalThis", "undefined", "NaN", "Infinity", "arguments", "eval",
    "Object", "Function", "Array", "String", "Number", "Boolean", "Symbol", "BigInt",
    "Math", "JSON", "Date", "RegExp", "Intl", "Reflect", "Proxy", "Atomics",
    "Error", "TypeError", "RangeError", "SyntaxError", "ReferenceError", "EvalError", "URIError",
    "AggregateError", "Promise", "Map", "Set", "WeakMap", "WeakSet", "WeakRef",
    "FinalizationRegistry", "ArrayBuffer", "SharedArrayBuffer", "DataView",
    "Int8Array", "Uint8Array", "Uint8ClampedArray", "Int16Array", "Uint16Array",
    "Int32Array", "Uint32Array", "Float32Array", "Float64Array", "BigInt64Array", "BigUint64Array",
    "parseInt", "parseFloat", "isNaN", "isFinite", "encodeURI", "encodeURIComponent",
    "decodeURI", "decodeURIComponent", "escape", "unescape",
    "console", "setTimeout", "clearTimeout", "setInterval", "clearInterval",
    "setImmediate", "clearImmediate", "queueMicrotask", "structuredClone", "fetch",
    "URL", "URLSearchParams", "TextEncoder", "TextDecoder", "AbortController", "AbortSignal",
    "process", "require", "module", "exports", "__dirname", "__filename", "Buffer", "global",
];

/// Names and module declarations visible to every file of a program.
#[derive(Debug, Clone)]
pub struct AmbientScope {
    pub globals: AHashSet<String>,
    pub modules: AHashSet<String>,
}

impl Default for AmbientScope {
    fn default() -> Self {
        Self::new()
    }
}

impl AmbientScope {
    pub fn new() -> Self {
        Self {
            globals: BUILTIN_GLOBALS.iter().map(|name| name.to_string()).collect(),
            modules: AHashSet::new(),
        }
    }

    /// Records what `source` declares globally: every top-level declaration of
    /// a script, plus `declare global` blocks, `declare module "x"` blocks and
    /// `export as namespace` of any file.
    pub fn collect(&mut self, source: &ParsedSource) {
        let is_script = !source.is_external_module();
        for item in &source.module.body {
            match item {
                ModuleItem::Stmt(Stmt::Decl(Decl::TsModule(decl))) => self.collect_module_decl(decl, is_script),
                ModuleItem::Stmt(Stmt::Decl(decl)) if is_script => self.collect_decl(decl),
                ModuleItem::ModuleDecl(ModuleDecl::TsNamespaceExport(export)) => {
                    self.globals.insert(export.id.sym.to_string());
                }
                _ => {}
            }
        }
    }

    fn collect_module_decl(&mut self, decl: &TsModuleDecl, is_script: bool) {
        match &decl.id {
            TsModuleName::Str(name) => {
                self.modules.insert(name.value.to_string());
            }
            TsModuleName::Ident(_) if decl.global => {
                if let Some(TsNamespaceBody::TsModuleBlock(block)) = &decl.body {
                    for item in &block.body {
                        if let ModuleItem::Stmt(Stmt::Decl(inner)) = item {
                            self.collect_decl(inner);
                        }
                    }
                }
            }
            TsModuleName::Ident(name) if is_script => {
                self.globals.insert(name.sym.to_string());
            }
            TsModuleName::Ident(_) => {}
        }
    }

    fn collect_decl(&mut self, decl: &Decl) {
        self.globals.extend(declared_names(decl));
    }
}

/// Value and type names introduced by a declaration.
pub fn declared_names(decl: &Decl) -> Vec<String> {
    match decl {
        Decl::Class(class) => vec![class.ident.sym.to_string()],
        Decl::Fn(function) => vec![function.ident.sym.to_string()],
        Decl::Var(var) => {
            let mut names = Vec::new();
            for declarator in &var.decls {
                pattern_names(&declarator.name, &mut names);
            }
            names
        }
        Decl::Using(using) => {
            let mut names = Vec::new();
            for declarator in &using.decls {
                pattern_names(&declarator.name, &mut names);
            }
            names
        }
        Decl::TsInterface(interface) => vec![interface.id.sym.to_string()],
        Decl::TsTypeAlias(alias) => vec![alias.id.sym.to_string()],
        Decl::TsEnum(enumeration) => vec![enumeration.id.sym.to_string()],
        Decl::TsModule(module) => match &module.id {
            TsModuleName::Ident(name) => vec![name.sym.to_string()],
            TsModuleName::Str(_) => vec![],
        },
    }
}

fn pattern_names(pat: &Pat, names: &mut Vec<String>) {
    match pat {
        Pat::Ident(binding) => names.push(binding.id.sym.to_string()),
        Pat::Array(array) => {
            for element in array.elems.iter().flatten() {
                pattern_names(element, names);
            }
        }
        Pat::Object(object) => {
            for prop in &object.props {
                match prop {
                    ObjectPatProp::KeyValue(key_value) => pattern_names(&key_value.value, names),
                    ObjectPatProp::Assign(assign) => names.push(assign.key.sym.to_string()),
                    ObjectPatProp::Rest(rest) => pattern_names(&rest.arg, names),
                }
            }
        }
        Pat::Rest(rest) => pattern_names(&rest.arg, names),
        Pat::Assign(assign) => pattern_names(&assign.left, names),
        Pat::Invalid(_) | Pat::Expr(_) => {}
    }
}

fn export_name(name: &ModuleExportName) -> String {
    match name {
        ModuleExportName::Ident(ident) => ident.sym.to_string(),
        ModuleExportName::Str(text) => text.value.to_string(),
    }
}

/// Every module specifier a file depends on, with the span of its string literal.
pub fn module_specifiers(module: &Module) -> Vec<&Str> {
    let mut specifiers = Vec::new();
    for item in &module.body {
        match item {
            ModuleItem::ModuleDecl(ModuleDecl::Import(import)) => specifiers.push(&*import.src),
            ModuleItem::ModuleDecl(ModuleDecl::ExportNamed(NamedExport { src: Some(src), .. })) => {
                specifiers.push(&**src)
            }
            ModuleItem::ModuleDecl(ModuleDecl::ExportAll(export)) => specifiers.push(&*export.src),
            ModuleItem::ModuleDecl(ModuleDecl::TsImportEquals(import)) => {
                if let TsModuleRef::TsExternalModuleRef(external) = &import.module_ref {
                    specifiers.push(&external.expr);
                }
            }
            _ => {}
        }
    }
    specifiers
}

/// What a file exports. An open module accepts any member import.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ModuleExports {
    pub names: AHashSet<String>,
    pub has_default: bool,
    pub open: bool,
}

pub fn module_exports(program: &Program, file_name: &str) -> ModuleExports {
    let mut visited = AHashSet::new();
    collect_exports(program, file_name, &mut visited)
}

fn collect_exports(program: &Program, file_name: &str, visited: &mut AHashSet<String>) -> ModuleExports {
    let mut exports = ModuleExports::default();
    if !visited.insert(file_name.to_string()) {
        return exports;
    }
    let Some(source) = program.get_source_file(file_name) else {
        exports.open = true;
        return exports;
    };
    if !source.is_external_module() {
        exports.open = true;
        return exports;
    }

    for item in &source.module.body {
        let ModuleItem::ModuleDecl(decl) = item else {
            continue;
        };
        match decl {
            ModuleDecl::ExportDecl(export) => exports.names.extend(declared_names(&export.decl)),
            ModuleDecl::ExportNamed(named) => {
                for specifier in &named.specifiers {
                    let name = match specifier {
                        ExportSpecifier::Named(named) => export_name(named.exported.as_ref().unwrap_or(&named.orig)),
                        ExportSpecifier::Namespace(namespace) => export_name(&namespace.name),
                        ExportSpecifier::Default(default) => default.exported.sym.to_string(),
                    };
                    if name == "default" {
                        exports.has_default = true;
                    } else {
                        exports.names.insert(name);
                    }
                }
            }
            ModuleDecl::ExportDefaultDecl(_) | ModuleDecl::ExportDefaultExpr(_) => exports.has_default = true,
            ModuleDecl::ExportAll(all) => match program.resolved_module(file_name, &all.src.value) {
                Some(Resolution::File(target)) => {
                    let nested = collect_exports(program, &target, visited);
                    exports.names.extend(nested.names);
                    exports.open |= nested.open;
                }
                Some(Resolution::Ambient(_)) | None => exports.open = true,
            },
            ModuleDecl::TsExportAssignment(_) => exports.open = true,
            ModuleDecl::Import(_)
            | ModuleDecl::TsImportEquals(_)
            | ModuleDecl::TsNamespaceExport(_) => {}
        }
    }
    exports
}

/// Module-level diagnostics of one file: unresolved specifiers and missing members.
pub fn check_imports(program: &Program, source: &ParsedSource) -> Vec<RawDiagnostic> {
    let file_name = source.file_name.as_str();
    let mut diagnostics = Vec::new();

    for specifier in module_specifiers(&source.module) {
        if program.resolved_module(file_name, &specifier.value).is_none() {
            diagnostics.push(RawDiagnostic::error(
                Some(file_name),
                CANNOT_FIND_MODULE,
                Some(source.span_range(specifier.span)),
                format!(
                    "Cannot find module '{}' or its corresponding type declarations.",
                    specifier.value
                ),
            ));
        }
    }

    for item in &source.module.body {
        match item {
            ModuleItem::ModuleDecl(ModuleDecl::Import(import)) => {
                let members = import.specifiers.iter().filter_map(|specifier| match specifier {
                    ImportSpecifier::Named(named) => Some(Member {
                        name: named
                            .imported
                            .as_ref()
                            .map_or_else(|| named.local.sym.to_string(), export_name),
                        span: named.imported.as_ref().map_or(named.local.span, module_export_span),
                    }),
                    ImportSpecifier::Default(default) => Some(Member {
                        name: "default".to_string(),
                        span: default.local.span,
                    }),
                    ImportSpecifier::Namespace(_) => None,
                });
                check_members(program, source, &import.src, members.collect(), &mut diagnostics);
            }
            ModuleItem::ModuleDecl(ModuleDecl::ExportNamed(NamedExport { src: Some(src), specifiers, .. })) => {
                let members = specifiers.iter().filter_map(|specifier| match specifier {
                    ExportSpecifier::Named(named) => Some(Member {
                        name: export_name(&named.orig),
                        span: module_export_span(&named.orig),
                    }),
                    ExportSpecifier::Namespace(_) | ExportSpecifier::Default(_) => None,
                });
                check_members(program, source, src, members.collect(), &mut diagnostics);
            }
            _ => {}
        }
    }
    diagnostics
}

struct Member {
    name: String,
    span: Span,
}

fn module_export_span(name: &ModuleExportName) -> Span {
    match name {
        ModuleExportName::Ident(ident) => ident.span,
        ModuleExportName::Str(text) => text.span,
    }
}

fn check_members(
    program: &Program,
    source: &ParsedSource,
    specifier: &Str,
    members: Vec<Member>,
    diagnostics: &mut Vec<RawDiagnostic>,
) {
    let file_name = source.file_name.as_str();
    let Some(Resolution::File(target)) = program.resolved_module(file_name, &specifier.value) else {
        return;
    };

    if let Some(target_source) = program.get_source_file(&target) {
        if !target_source.is_external_module() && !target_source.is_javascript() && !target_source.is_declaration() {
            diagnostics.push(RawDiagnostic::error(
                Some(file_name),
                NOT_A_MODULE,
                Some(source.span_range(specifier.span)),
                format!("File '{target}' is not a module."),
            ));
            return;
        }
    }

    let exports = module_exports(program, &target);
    if exports.open {
        return;
    }
    for member in members {
        if member.name == "default" {
            if !exports.has_default {
                diagnostics.push(RawDiagnostic::error(
                    Some(file_name),
                    NO_DEFAULT_EXPORT,
                    Some(source.span_range(member.span)),
                    format!("Module '\"{}\"' has no default export.", specifier.value),
                ));
            }
        } else if !exports.names.contains(&member.name) {
            diagnostics.push(RawDiagnostic::error(
                Some(file_name),
                NO_EXPORTED_MEMBER,
                Some(source.span_range(member.span)),
                format!(
                    "Module '\"{}\"' has no exported member '{}'.",
                    specifier.value, member.name
                ),
            ));
        }
    }
}

/// Value references that bind neither locally nor to an ambient global.
pub fn check_names(program: &Program, source: &ParsedSource) -> Vec<RawDiagnostic> {
    program.with_globals(|| {
        let module = apply(
            source.module.clone(),
            resolver(program.unresolved_mark(), program.top_level_mark(), true),
        );

        let mut finder = UnresolvedNames {
            unresolved_mark: program.unresolved_mark(),
            ambient: program.ambient_scope(),
            found: Vec::new(),
        };
        module.visit_with(&mut finder);

        finder
            .found
            .into_iter()
            .map(|ident| {
                RawDiagnostic::error(
                    Some(&source.file_name),
                    CANNOT_FIND_NAME,
                    Some(source.span_range(ident.span)),
                    format!("Cannot find name '{}'.", ident.sym),
                )
            })
            .collect()
    })
}

struct UnresolvedNames<'a> {
    unresolved_mark: Mark,
    ambient: &'a AmbientScope,
    found: Vec<Ident>,
}

impl UnresolvedNames<'_> {
    fn check(&mut self, ident: &Ident) {
        if ident.ctxt.outer() == self.unresolved_mark && !self.ambient.globals.contains(&*ident.sym) {
            self.found.push(ident.clone());
        }
    }
}

impl Visit for UnresolvedNames<'_> {
    fn visit_expr(&mut self, expr: &Expr) {
        if let Expr::Ident(ident) = expr {
            self.check(ident);
        }
        expr.visit_children_with(self);
    }

    fn visit_prop(&mut self, prop: &Prop) {
        if let Prop::Shorthand(ident) = prop {
            self.check(ident);
        }
        prop.visit_children_with(self);
    }

    fn visit_ts_module_decl(&mut self, decl: &TsModuleDecl) {
        if !decl.declare {
            decl.visit_children_with(self);
        }
    }

    fn visit_ts_type(&mut self, _: &TsType) {}
}
