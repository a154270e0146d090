//! Deterministic analyzer. Parses Python with tree-sitter and matches the
//! rule table against calls, assignments, loops and string literals. This
//! pass never fails a scan: unparseable input yields a synthetic finding
//! and whatever the partial tree still supports.

pub mod parser;
pub mod rules;

pub use parser::StatementIndex;
pub use rules::{RuleDef, RULES};

use crate::config::RulesConfig;
use crate::core::{Category, Finding, Location, Severity};
use streaming_iterator::StreamingIterator;
use tracing::warn;
use tree_sitter::{Language, Node, Query, QueryCursor};

/// Output of the deterministic pass. The statement index tags along so the
/// normalizer can snap model-reported lines onto real statements.
#[derive(Debug, Default)]
pub struct StaticPass {
    pub findings: Vec<Finding>,
    pub statements: StatementIndex,
}

pub fn analyze(path: &str, source: &str, config: &RulesConfig) -> StaticPass {
    let tree = match parser::parse_module(source) {
        Ok(tree) => tree,
        Err(err) => {
            warn!(path, error = %err, "parser rejected source, static pass degraded");
            return StaticPass {
                findings: vec![unparseable_finding(path, 1)],
                statements: StatementIndex::default(),
            };
        }
    };

    let root = tree.root_node();
    let mut findings = Vec::new();
    if root.has_error() {
        findings.push(unparseable_finding(path, parser::first_error_line(root)));
    }

    let walker = RuleWalker { path, source, config };
    walker.run(root, &mut findings);

    findings.sort_by(|a, b| {
        a.location
            .line
            .cmp(&b.location.line)
            .then_with(|| a.location.column.cmp(&b.location.column))
            .then_with(|| a.rule_id.cmp(&b.rule_id))
    });

    StaticPass {
        findings,
        statements: StatementIndex::from_tree(root),
    }
}

fn unparseable_finding(path: &str, line: usize) -> Finding {
    Finding::new(
        "syntax",
        Category::Unparseable,
        Severity::Low,
        0.9,
        "Source could not be fully parsed; findings may be incomplete.",
        Location::new(path, line, 0),
    )
}

struct RuleWalker<'a> {
    path: &'a str,
    source: &'a str,
    config: &'a RulesConfig,
}

impl RuleWalker<'_> {
    fn run(&self, root: Node<'_>, out: &mut Vec<Finding>) {
        let language = parser::python_language();
        self.for_each_capture(&language, root, "(call) @call", out, Self::inspect_call);
        self.for_each_capture(
            &language,
            root,
            "(assignment) @assignment",
            out,
            Self::inspect_assignment,
        );
        self.for_each_capture(
            &language,
            root,
            "(while_statement) @loop",
            out,
            Self::inspect_while,
        );
        self.for_each_capture(&language, root, "(string) @string", out, Self::inspect_string);
    }

    fn for_each_capture(
        &self,
        language: &Language,
        root: Node<'_>,
        pattern: &str,
        out: &mut Vec<Finding>,
        visit: fn(&Self, Node<'_>, &mut Vec<Finding>),
    ) {
        let query = match Query::new(language, pattern) {
            Ok(query) => query,
            Err(err) => {
                warn!(pattern, error = %err, "query compilation failed, rule skipped");
                return;
            }
        };
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, root, self.source.as_bytes());
        matches.advance();
        while let Some(m) = matches.get() {
            for capture in m.captures {
                visit(self, capture.node, out);
            }
            matches.advance();
        }
    }

    fn inspect_call(&self, call: Node<'_>, out: &mut Vec<Finding>) {
        let Some(callee) = parser::callee_text(call, self.source) else {
            return;
        };
        let method = parser::callee_method(call, self.source).unwrap_or_default();
        let positional = parser::positional_args(call);
        let dynamic_first = positional.first().map(|arg| !parser::is_literal_expr(*arg));

        let spawns_shell = callee == "os.system"
            || callee == "os.popen"
            || (callee.starts_with("subprocess.")
                && parser::keyword_arg_is_true(call, "shell", self.source));
        match (spawns_shell, dynamic_first) {
            (true, Some(true)) => self.emit(
                &rules::SHELL_CALL,
                call,
                format!(
                    "`{callee}` runs a shell command assembled at runtime. \
                     Attacker-influenced input in the command string executes arbitrary shell code."
                ),
                out,
            ),
            (true, Some(false)) => self.emit(
                &rules::SHELL_CALL_LITERAL,
                call,
                format!(
                    "`{callee}` spawns a shell for a fixed command. \
                     Prefer an argument list without `shell=True`."
                ),
                out,
            ),
            _ => {}
        }

        if (callee == "eval" || callee == "exec") && dynamic_first == Some(true) {
            self.emit(
                &rules::CODE_EVAL,
                call,
                format!("`{callee}` evaluates a dynamically built expression as Python code."),
                out,
            );
        }

        if (method == "execute" || method == "executemany") && dynamic_first == Some(true) {
            self.emit(
                &rules::SQL_EXEC,
                call,
                "SQL statement is assembled from dynamic input. \
                 Use parameterized queries instead of string building."
                    .to_string(),
                out,
            );
        }

        match callee.as_str() {
            "pickle.load" | "pickle.loads" => self.emit(
                &rules::UNSAFE_PICKLE,
                call,
                format!("`{callee}` runs attacker-chosen constructors when fed untrusted data."),
                out,
            ),
            "marshal.load" | "marshal.loads" => self.emit(
                &rules::UNSAFE_MARSHAL,
                call,
                format!("`{callee}` deserializes untrusted data with no safety guarantees."),
                out,
            ),
            "yaml.unsafe_load" => self.emit(
                &rules::UNSAFE_YAML,
                call,
                "`yaml.unsafe_load` instantiates arbitrary Python objects. \
                 Use `yaml.safe_load`."
                    .to_string(),
                out,
            ),
            "yaml.load" if !self.yaml_uses_safe_loader(call) => self.emit(
                &rules::UNSAFE_YAML,
                call,
                "`yaml.load` without a safe loader instantiates arbitrary Python objects. \
                 Pass `Loader=yaml.SafeLoader` or use `yaml.safe_load`."
                    .to_string(),
                out,
            ),
            "hashlib.md5" | "hashlib.sha1" => self.emit(
                &rules::WEAK_HASH,
                call,
                format!("`{callee}` is cryptographically broken. Use SHA-256 or stronger."),
                out,
            ),
            _ => {}
        }

        if (callee == "open" || callee == "os.path.join")
            && positional.iter().any(|arg| !parser::is_literal_expr(*arg))
        {
            self.emit(
                &rules::PATH_DYNAMIC,
                call,
                format!(
                    "`{callee}` receives a path built from dynamic input. \
                     Canonicalize and validate it before use."
                ),
                out,
            );
        }

        let logger_method = matches!(
            method,
            "debug" | "info" | "warning" | "error" | "critical" | "exception"
        ) && callee.to_ascii_lowercase().contains("log");
        if callee == "print" || callee.starts_with("logging.") || logger_method {
            if let Some(args) = call.child_by_field_name("arguments") {
                if parser::subtree_has_secret_identifier(args, self.source) {
                    self.emit(
                        &rules::SECRET_LOGGING,
                        call,
                        "A secret-bearing value is written to program output. \
                         Scrub credentials before logging."
                            .to_string(),
                        out,
                    );
                }
            }
        }

        if let Some(value) = parser::keyword_arg(call, "verify", self.source) {
            if value.kind() == "false" {
                self.emit(
                    &rules::TLS_VERIFY_OFF,
                    call,
                    "`verify=False` disables TLS certificate validation and \
                     exposes the connection to interception."
                        .to_string(),
                    out,
                );
            }
        }

        let dangerous_sink = matches!(callee.as_str(), "eval" | "exec" | "os.system" | "os.popen" | "open")
            || callee.starts_with("subprocess.")
            || method == "execute"
            || method == "executemany";
        if dangerous_sink {
            if let Some(args) = call.child_by_field_name("arguments") {
                if parser::subtree_reads_stdin(args, self.source) {
                    self.emit(
                        &rules::INPUT_TO_SINK,
                        call,
                        "Raw `input()` data reaches a dangerous call without validation."
                            .to_string(),
                        out,
                    );
                }
            }
        }
    }

    fn yaml_uses_safe_loader(&self, call: Node<'_>) -> bool {
        if let Some(loader) = parser::keyword_arg(call, "Loader", self.source) {
            return parser::node_text(loader, self.source).contains("Safe");
        }
        parser::positional_args(call)
            .get(1)
            .map(|arg| parser::node_text(*arg, self.source).contains("Safe"))
            .unwrap_or(false)
    }

    fn inspect_assignment(&self, assignment: Node<'_>, out: &mut Vec<Finding>) {
        let Some(left) = assignment.child_by_field_name("left") else {
            return;
        };
        let Some(right) = assignment.child_by_field_name("right") else {
            return;
        };
        if left.kind() != "identifier" {
            return;
        }
        let name = parser::node_text(left, self.source);
        if !parser::is_secret_name(name) {
            return;
        }
        if right.kind() != "string" || !parser::is_literal_expr(right) {
            return;
        }
        let value = parser::node_text(right, self.source);
        let content = value.trim_matches(|c| c == '"' || c == '\'');
        // short placeholders like "" or "changeme"[:7] are noise
        if content.len() < 8 {
            return;
        }
        self.emit(
            &rules::HARDCODED_SECRET,
            assignment,
            format!(
                "`{name}` is assigned a literal value in source. \
                 Move it to the environment or a secret store."
            ),
            out,
        );
    }

    fn inspect_while(&self, loop_node: Node<'_>, out: &mut Vec<Finding>) {
        let Some(condition) = loop_node.child_by_field_name("condition") else {
            return;
        };
        if condition.kind() != "true" {
            return;
        }
        let Some(body) = loop_node.child_by_field_name("body") else {
            return;
        };
        let has_exit = parser::subtree_has_kind(body, "break_statement")
            || parser::subtree_has_kind(body, "return_statement")
            || parser::subtree_has_kind(body, "raise_statement");
        if has_exit {
            return;
        }
        self.emit(
            &rules::BUSY_LOOP,
            loop_node,
            "`while True` loop has no exit path and can pin a worker indefinitely.".to_string(),
            out,
        );
    }

    fn inspect_string(&self, string_node: Node<'_>, out: &mut Vec<Finding>) {
        let text = parser::node_text(string_node, self.source);

        if let Some(idx) = text.find("http://") {
            let rest = &text[idx + "http://".len()..];
            let loopback = rest.starts_with("localhost")
                || rest.starts_with("127.0.0.1")
                || rest.starts_with("0.0.0.0");
            if !loopback {
                self.emit(
                    &rules::PLAINTEXT_URL,
                    string_node,
                    "Cleartext `http://` endpoint. \
                     Traffic is readable and modifiable in transit."
                        .to_string(),
                    out,
                );
            }
        }

        if text.contains("../") {
            self.emit(
                &rules::PATH_DOTDOT,
                string_node,
                "Path literal steps into a parent directory.".to_string(),
                out,
            );
        }
    }

    fn emit(&self, rule: &'static RuleDef, node: Node<'_>, description: String, out: &mut Vec<Finding>) {
        if !self.config.category_enabled(&rule.category) {
            return;
        }
        let start = node.start_position();
        let end = node.end_position();
        let location = Location::new(self.path, start.row + 1, start.column)
            .with_end(end.row + 1, end.column)
            .with_snippet(snippet_of(node, self.source));
        out.push(Finding::new(
            rule.id,
            rule.category.clone(),
            rule.severity,
            rule.confidence,
            description,
            location,
        ));
    }
}

/// First line of the node text, capped so snippets stay log-friendly.
fn snippet_of(node: Node<'_>, source: &str) -> String {
    let text = parser::node_text(node, source);
    let first_line = text.lines().next().unwrap_or(text);
    first_line.trim().chars().take(120).collect()
}
