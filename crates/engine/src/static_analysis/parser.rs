//! tree-sitter plumbing: parsing, the statement-boundary index, and node
//! helpers shared by the rule walker.

use crate::error::ParseError;
use tree_sitter::{Language, Node, Parser, Tree};

pub fn python_language() -> Language {
    tree_sitter_python::LANGUAGE.into()
}

pub fn parse_module(source: &str) -> Result<Tree, ParseError> {
    let mut parser = Parser::new();
    parser
        .set_language(&python_language())
        .map_err(|e| ParseError::Grammar(e.to_string()))?;
    parser.parse(source, None).ok_or(ParseError::Rejected)
}

pub fn node_text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    &source[node.byte_range()]
}

/// Sorted start lines (1-based) of every statement-level node. The
/// normalizer snaps model-reported lines onto these.
#[derive(Debug, Clone, Default)]
pub struct StatementIndex {
    lines: Vec<usize>,
}

impl StatementIndex {
    pub fn from_tree(root: Node<'_>) -> Self {
        let mut lines = Vec::new();
        collect_statement_lines(root, &mut lines);
        lines.sort_unstable();
        lines.dedup();
        Self { lines }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Nearest statement boundary; ties resolve downward. An empty index
    /// leaves the line unchanged.
    pub fn snap(&self, line: usize) -> usize {
        if self.lines.is_empty() {
            return line;
        }
        let idx = self.lines.partition_point(|&l| l < line);
        if idx == 0 {
            return self.lines[0];
        }
        if idx == self.lines.len() {
            return self.lines[self.lines.len() - 1];
        }
        let below = self.lines[idx - 1];
        let above = self.lines[idx];
        if line - below <= above - line {
            below
        } else {
            above
        }
    }
}

fn collect_statement_lines(node: Node<'_>, out: &mut Vec<usize>) {
    let kind = node.kind();
    if kind.ends_with("_statement")
        || matches!(kind, "function_definition" | "class_definition" | "decorated_definition")
    {
        out.push(node.start_position().row + 1);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_statement_lines(child, out);
    }
}

/// Line of the first parse-error node, for the synthetic finding's
/// location.
pub fn first_error_line(root: Node<'_>) -> usize {
    fn walk(node: Node<'_>) -> Option<usize> {
        if node.is_error() || node.is_missing() {
            return Some(node.start_position().row + 1);
        }
        if !node.has_error() {
            return None;
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if let Some(line) = walk(child) {
                return Some(line);
            }
        }
        None
    }
    walk(root).unwrap_or(1)
}

/// A literal expression cannot carry attacker-controlled data: plain
/// strings without interpolation, numbers, and keyword constants.
pub fn is_literal_expr(node: Node<'_>) -> bool {
    match node.kind() {
        "string" => !has_interpolation(node),
        "concatenated_string" => {
            let mut cursor = node.walk();
            node.named_children(&mut cursor)
                .all(|c| c.kind() == "string" && !has_interpolation(c))
        }
        "integer" | "float" | "true" | "false" | "none" => true,
        _ => false,
    }
}

fn has_interpolation(string_node: Node<'_>) -> bool {
    let mut cursor = string_node.walk();
    string_node
        .named_children(&mut cursor)
        .any(|c| c.kind() == "interpolation")
}

/// Positional arguments of a call, keyword arguments excluded.
pub fn positional_args<'tree>(call: Node<'tree>) -> Vec<Node<'tree>> {
    let Some(args) = call.child_by_field_name("arguments") else {
        return Vec::new();
    };
    let mut cursor = args.walk();
    args.named_children(&mut cursor)
        .filter(|c| c.kind() != "keyword_argument")
        .collect()
}

/// Value node of the keyword argument `name`, if present.
pub fn keyword_arg<'tree>(call: Node<'tree>, name: &str, source: &str) -> Option<Node<'tree>> {
    let args = call.child_by_field_name("arguments")?;
    let mut cursor = args.walk();
    for child in args.named_children(&mut cursor) {
        if child.kind() != "keyword_argument" {
            continue;
        }
        let Some(key) = child.child_by_field_name("name") else {
            continue;
        };
        if node_text(key, source) == name {
            return child.child_by_field_name("value");
        }
    }
    None
}

pub fn keyword_arg_is_true(call: Node<'_>, name: &str, source: &str) -> bool {
    keyword_arg(call, name, source).map(|v| v.kind() == "true").unwrap_or(false)
}

/// Dotted callee text with whitespace stripped, e.g. "os.system" or
/// "cursor.execute".
pub fn callee_text(call: Node<'_>, source: &str) -> Option<String> {
    let func = call.child_by_field_name("function")?;
    let text: String = node_text(func, source)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    Some(text)
}

/// The trailing attribute name of a method call ("execute" for
/// `cursor.execute(...)`), or the bare identifier for plain calls.
pub fn callee_method<'a>(call: Node<'_>, source: &'a str) -> Option<&'a str> {
    let func = call.child_by_field_name("function")?;
    match func.kind() {
        "attribute" => func.child_by_field_name("attribute").map(|a| node_text(a, source)),
        "identifier" => Some(node_text(func, source)),
        _ => None,
    }
}

/// Any identifier in the subtree whose name suggests secret material.
pub fn subtree_has_secret_identifier(node: Node<'_>, source: &str) -> bool {
    if node.kind() == "identifier" && is_secret_name(node_text(node, source)) {
        return true;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if subtree_has_secret_identifier(child, source) {
            return true;
        }
    }
    false
}

const SECRET_MARKERS: [&str; 9] = [
    "password",
    "passwd",
    "secret",
    "token",
    "api_key",
    "apikey",
    "private_key",
    "credential",
    "auth_key",
];

pub fn is_secret_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    SECRET_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Does this subtree call `input(...)` anywhere?
pub fn subtree_reads_stdin(node: Node<'_>, source: &str) -> bool {
    if node.kind() == "call" {
        if let Some(callee) = callee_text(node, source) {
            if callee == "input" {
                return true;
            }
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if subtree_reads_stdin(child, source) {
            return true;
        }
    }
    false
}

pub fn subtree_has_kind(node: Node<'_>, kind: &str) -> bool {
    if node.kind() == kind {
        return true;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if subtree_has_kind(child, kind) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_index_snaps_to_nearest_boundary() {
        let source = "import os\n\n\ndef f():\n    x = 1\n    return x\n";
        let tree = parse_module(source).unwrap();
        let index = StatementIndex::from_tree(tree.root_node());
        assert_eq!(index.snap(1), 1);
        assert_eq!(index.snap(3), 4);
        assert_eq!(index.snap(100), 6);
    }

    #[test]
    fn literal_detection_rejects_fstrings() {
        let source = "a = \"plain\"\nb = f\"hello {name}\"\nc = cmd\n";
        let tree = parse_module(source).unwrap();
        let root = tree.root_node();
        let mut literals = Vec::new();
        fn walk(node: Node<'_>, out: &mut Vec<bool>) {
            if node.kind() == "assignment" {
                if let Some(right) = node.child_by_field_name("right") {
                    out.push(is_literal_expr(right));
                }
            }
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                walk(child, out);
            }
        }
        walk(root, &mut literals);
        assert_eq!(literals, vec![true, false, false]);
    }

    #[test]
    fn callee_helpers_see_through_attribute_chains() {
        let source = "conn.cursor().execute(q)\nos.system(c)\n";
        let tree = parse_module(source).unwrap();
        let mut calls = Vec::new();
        fn walk<'t>(node: Node<'t>, out: &mut Vec<Node<'t>>) {
            if node.kind() == "call" {
                out.push(node);
            }
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                walk(child, out);
            }
        }
        walk(tree.root_node(), &mut calls);
        let methods: Vec<_> = calls
            .iter()
            .filter_map(|c| callee_method(*c, source))
            .collect();
        assert!(methods.contains(&"execute"));
        assert!(methods.contains(&"system"));
        assert_eq!(
            callee_text(calls[calls.len() - 1], source).as_deref(),
            Some("os.system")
        );
    }

    #[test]
    fn secret_names_match_markers() {
        assert!(is_secret_name("DB_PASSWORD"));
        assert!(is_secret_name("apiKey"));
        assert!(!is_secret_name("username"));
    }
}
