//! The built-in rule set: a small subset of `@typescript-eslint`.

use super::{LintConfig, LintMessage, Linter, RULE_NAMESPACE, RuleLevel};
use crate::compiler::program::Program;
use crate::compiler::source_cache::{ParsedSource, SourceFileCache};
use crate::helpers;
use ahash::AHashSet;
use anyhow::Result;
use swc_core::common::Span;
use swc_core::ecma::ast::*;
use swc_core::ecma::visit::{Visit, VisitWith};

const FLOATING_PROMISE_MESSAGE: &str = "Promises must be awaited, end with a call to .catch, end with a call to .then with a rejection handler or be explicitly marked as ignored with the `void` operator.";
const EXPLICIT_ANY_MESSAGE: &str = "Unexpected any. Specify a different type.";
const NON_NULL_ASSERTION_MESSAGE: &str = "Forbidden non-null assertion.";

/// A rule finding, before severity and positions are attached.
struct Finding {
    message_id: &'static str,
    message: &'static str,
    span: Span,
}

type RuleFn = fn(&ParsedSource, &Program) -> Vec<Finding>;

const RULES: &[(&str, RuleFn)] = &[
    ("no-explicit-any", no_explicit_any),
    ("no-floating-promises", no_floating_promises),
    ("no-non-null-assertion", no_non_null_assertion),
];

fn find_rule(rule_id: &str) -> Option<RuleFn> {
    let name = rule_id.strip_prefix(RULE_NAMESPACE)?;
    RULES
        .iter()
        .find(|(rule, _)| *rule == name)
        .map(|(_, check)| *check)
}

/// Runs the built-in rules over one file, using the program for type-aware rules.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleLinter;

impl RuleLinter {
    pub fn new() -> Self {
        Self
    }

    pub fn rule_names() -> impl Iterator<Item = String> {
        RULES.iter().map(|(name, _)| format!("{RULE_NAMESPACE}{name}"))
    }
}

impl Linter for RuleLinter {
    fn verify(&self, source: &str, config: &LintConfig<'_>, file_name: &str) -> Result<Vec<LintMessage>> {
        let parsed = match config.program.get_source_file(file_name) {
            Some(parsed) if parsed.text() == source => parsed.clone(),
            _ => SourceFileCache::new().get(file_name, || source.to_string()),
        };

        if let Some(error) = parsed.parse_diagnostics.first() {
            let (line, column) = helpers::line_column_of(source, error.start.unwrap_or(0));
            return Ok(vec![LintMessage {
                rule_id: None,
                message_id: None,
                severity: 2,
                message: format!(
                    "Parsing error: {}",
                    crate::diagnostic::get_message_text(&error.message_text)
                ),
                line,
                column,
                end_line: None,
                end_column: None,
            }]);
        }

        let mut messages = Vec::new();
        for (rule_id, level) in config.rules {
            if *level == RuleLevel::Off {
                continue;
            }
            let Some(check) = find_rule(rule_id) else {
                messages.push(LintMessage {
                    rule_id: Some(rule_id.clone()),
                    message_id: None,
                    severity: level.severity(),
                    message: format!("Definition for rule '{rule_id}' was not found."),
                    line: 1,
                    column: 1,
                    end_line: None,
                    end_column: None,
                });
                continue;
            };
            for finding in check(&parsed, config.program) {
                let (start, length) = parsed.span_range(finding.span);
                let (line, column) = helpers::line_column_of(source, start);
                let (end_line, end_column) = helpers::line_column_of(source, start + length);
                messages.push(LintMessage {
                    rule_id: Some(rule_id.clone()),
                    message_id: Some(finding.message_id.to_string()),
                    severity: level.severity(),
                    message: finding.message.to_string(),
                    line,
                    column,
                    end_line: Some(end_line),
                    end_column: Some(end_column),
                });
            }
        }
        messages.sort_by_key(|message| (message.line, message.column));
        Ok(messages)
    }
}

fn no_explicit_any(source: &ParsedSource, _: &Program) -> Vec<Finding> {
    struct Visitor(Vec<Finding>);

    impl Visit for Visitor {
        fn visit_ts_keyword_type(&mut self, keyword: &TsKeywordType) {
            if keyword.kind == TsKeywordTypeKind::TsAnyKeyword {
                self.0.push(Finding {
                    message_id: "unexpectedAny",
                    message: EXPLICIT_ANY_MESSAGE,
                    span: keyword.span,
                });
            }
        }
    }

    let mut visitor = Visitor(Vec::new());
    source.module.visit_with(&mut visitor);
    visitor.0
}

fn no_non_null_assertion(source: &ParsedSource, _: &Program) -> Vec<Finding> {
    struct Visitor(Vec<Finding>);

    impl Visit for Visitor {
        fn visit_ts_non_null_expr(&mut self, expr: &TsNonNullExpr) {
            self.0.push(Finding {
                message_id: "noNonNull",
                message: NON_NULL_ASSERTION_MESSAGE,
                span: expr.span,
            });
            expr.visit_children_with(self);
        }
    }

    let mut visitor = Visitor(Vec::new());
    source.module.visit_with(&mut visitor);
    visitor.0
}

/// Names of functions and methods that return promises anywhere in the program.
#[derive(Debug, Default)]
struct PromiseReturning {
    functions: AHashSet<String>,
    methods: AHashSet<String>,
}

fn is_promise_type(annotation: Option<&TsTypeAnn>) -> bool {
    match annotation.map(|annotation| &*annotation.type_ann) {
        Some(TsType::TsTypeRef(reference)) => match &reference.type_name {
            TsEntityName::Ident(name) => &*name.sym == "Promise" || &*name.sym == "PromiseLike",
            _ => false,
        },
        _ => false,
    }
}

fn returns_promise(function: &Function) -> bool {
    function.is_async || is_promise_type(function.return_type.as_deref())
}

impl Visit for PromiseReturning {
    fn visit_fn_decl(&mut self, decl: &FnDecl) {
        if returns_promise(&decl.function) {
            self.functions.insert(decl.ident.sym.to_string());
        }
        decl.visit_children_with(self);
    }

    fn visit_var_declarator(&mut self, declarator: &VarDeclarator) {
        if let (Pat::Ident(binding), Some(init)) = (&declarator.name, &declarator.init) {
            let is_promise = match &**init {
                Expr::Arrow(arrow) => arrow.is_async || is_promise_type(arrow.return_type.as_deref()),
                Expr::Fn(function) => returns_promise(&function.function),
                _ => false,
            };
            if is_promise {
                self.functions.insert(binding.id.sym.to_string());
            }
        }
        declarator.visit_children_with(self);
    }

    fn visit_class_method(&mut self, method: &ClassMethod) {
        if let PropName::Ident(name) = &method.key {
            if returns_promise(&method.function) {
                self.methods.insert(name.sym.to_string());
            }
        }
        method.visit_children_with(self);
    }

    fn visit_ts_method_signature(&mut self, signature: &TsMethodSignature) {
        if let Expr::Ident(name) = &*signature.key {
            if is_promise_type(signature.type_ann.as_deref()) {
                self.methods.insert(name.sym.to_string());
            }
        }
    }
}

fn promise_returning(program: &Program) -> PromiseReturning {
    let mut collector = PromiseReturning::default();
    collector.functions.insert("fetch".to_string());
    for source in program.source_files() {
        source.module.visit_with(&mut collector);
    }
    collector
}

const PROMISE_STATICS: &[&str] = &["resolve", "reject", "all", "allSettled", "race", "any"];

fn member_name(member: &MemberExpr) -> Option<&str> {
    match &member.prop {
        MemberProp::Ident(name) => Some(&*name.sym),
        _ => None,
    }
}

impl PromiseReturning {
    fn is_promise(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Paren(paren) => self.is_promise(&paren.expr),
            Expr::New(new) => matches!(&*new.callee, Expr::Ident(callee) if &*callee.sym == "Promise"),
            Expr::Call(call) => match &call.callee {
                Callee::Expr(callee) => self.is_promise_call(callee),
                Callee::Super(_) | Callee::Import(_) => false,
            },
            _ => false,
        }
    }

    fn is_promise_call(&self, callee: &Expr) -> bool {
        match callee {
            Expr::Paren(paren) => self.is_promise_call(&paren.expr),
            Expr::Ident(name) => self.functions.contains(&*name.sym),
            Expr::Arrow(arrow) => arrow.is_async,
            Expr::Fn(function) => returns_promise(&function.function),
            Expr::Member(member) => match (&*member.obj, member_name(member)) {
                (Expr::Ident(object), Some(name)) if &*object.sym == "Promise" => PROMISE_STATICS.contains(&name),
                (object, Some("then" | "catch" | "finally")) => self.is_promise(object),
                (_, Some(name)) => self.methods.contains(name),
                _ => false,
            },
            _ => false,
        }
    }

    /// A promise statement is handled by `void`, `.catch(...)` or a
    /// two-argument `.then(...)`.
    fn is_floating(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Paren(paren) => self.is_floating(&paren.expr),
            Expr::Unary(unary) if unary.op == UnaryOp::Void => false,
            Expr::Await(_) => false,
            Expr::Call(call) => {
                if let Callee::Expr(callee) = &call.callee {
                    if let Expr::Member(member) = &**callee {
                        match member_name(member) {
                            Some("catch") if self.is_promise(&member.obj) => return call.args.is_empty(),
                            Some("then") if self.is_promise(&member.obj) => return call.args.len() < 2,
                            Some("finally") if self.is_promise(&member.obj) => return self.is_floating(&member.obj),
                            _ => {}
                        }
                    }
                }
                self.is_promise(expr)
            }
            _ => self.is_promise(expr),
        }
    }
}

fn no_floating_promises(source: &ParsedSource, program: &Program) -> Vec<Finding> {
    struct Visitor {
        promises: PromiseReturning,
        found: Vec<Finding>,
    }

    impl Visit for Visitor {
        fn visit_expr_stmt(&mut self, stmt: &ExprStmt) {
            if self.promises.is_floating(&stmt.expr) {
                self.found.push(Finding {
                    message_id: "floatingVoid",
                    message: FLOATING_PROMISE_MESSAGE,
                    span: stmt.span,
                });
            }
            stmt.visit_children_with(self);
        }
    }

    let mut visitor = Visitor {
        promises: promise_returning(program),
        found: Vec::new(),
    };
    source.module.visit_with(&mut visitor);
    visitor.found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::EmbedTypeScript;
    use crate::config::{EmbedProps, InputSet};
    use crate::lint::{LintRules, prefix_rules};
    use pretty_assertions::assert_eq;

    fn lint(source: &str, rules: &[(&str, RuleLevel)]) -> Vec<LintMessage> {
        let mut files = InputSet::new();
        files.insert("a.ts".to_string(), source.to_string());
        let compiler = EmbedTypeScript::new(EmbedProps::default());
        let fountain = compiler.fountain(&files);
        let rules: LintRules = prefix_rules(
            &rules
                .iter()
                .map(|(name, level)| (name.to_string(), *level))
                .collect(),
        );
        let config = LintConfig {
            program: fountain.program(),
            rules: &rules,
        };
        RuleLinter::new().verify(source, &config, "a.ts").expect("lint runs")
    }

    fn message_ids(messages: &[LintMessage]) -> Vec<Option<String>> {
        messages.iter().map(|message| message.message_id.clone()).collect()
    }

    #[test]
    fn flags_unhandled_promises() {
        let messages = lint(
            "async function load(): Promise<number> { return 1; }\nload();\nload().then(() => {});\nPromise.resolve(1);\nnew Promise(() => {});",
            &[("no-floating-promises", RuleLevel::Error)],
        );
        assert_eq!(messages.len(), 4);
        assert_eq!((messages[0].line, messages[0].column), (2, 1));
        assert_eq!((messages[0].end_line, messages[0].end_column), (Some(2), Some(8)));
        assert!(messages.iter().all(|message| message.severity == 2));
    }

    #[test]
    fn accepts_handled_promises() {
        let messages = lint(
            "const load = async () => 1;\nvoid load();\nload().catch(() => {});\nload().then(() => {}, () => {});\nasync function main() { await load(); }\nmain().catch(console.error);",
            &[("no-floating-promises", RuleLevel::Error)],
        );
        assert_eq!(messages, vec![]);
    }

    #[test]
    fn flags_any_and_non_null() {
        let messages = lint(
            "export function f(value: any, list?: string[]) { return list!.length; }",
            &[("no-explicit-any", RuleLevel::Warn), ("no-non-null-assertion", RuleLevel::Error)],
        );
        assert_eq!(
            message_ids(&messages),
            vec![Some("unexpectedAny".to_string()), Some("noNonNull".to_string())]
        );
        assert_eq!(messages[0].severity, 1);
        assert_eq!(messages[0].column, 26);
    }

    #[test]
    fn unknown_rules_are_reported() {
        let messages = lint("export {};", &[("no-unused-vars", RuleLevel::Error), ("no-explicit-any", RuleLevel::Off)]);
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0].message,
            "Definition for rule '@typescript-eslint/no-unused-vars' was not found."
        );
        assert_eq!(messages[0].severity, 2);
    }

    #[test]
    fn parse_errors_become_a_single_message() {
        let messages = lint("const = ;", &[("no-explicit-any", RuleLevel::Error)]);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].rule_id, None);
        assert!(messages[0].message.starts_with("Parsing error: "));
    }

    #[test]
    fn lists_builtin_rules() {
        assert_eq!(
            RuleLinter::rule_names().collect::<Vec<_>>(),
            vec![
                "@typescript-eslint/no-explicit-any",
                "@typescript-eslint/no-floating-promises",
                "@typescript-eslint/no-non-null-assertion",
            ]
        );
    }
}
