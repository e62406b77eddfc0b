//! Structural model of one function's source text.
//!
//! A [`SourceModel`] is built once from a snapshot of source text. Parsing is
//! done with the tree-sitter grammar of the selected [`SourceLanguage`]; any
//! error or missing node in the resulting tree rejects the text. Definitions
//! and unstructured-output call sites are derived eagerly at construction so
//! the model is immutable afterwards.

use std::ops::Range;

use sha2::{Digest, Sha256};
use tree_sitter::{Node, Tree};

use crate::errors::{EvolveError, EvolveResult};
use crate::source::language::{new_parser, SourceLanguage};

// ---------------------------------------------------------------------------
// Extracted facts
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DefinitionKind {
    Function,
    Method,
    Constructor,
}

/// A function, method or constructor found in the source.
#[derive(Clone, Debug, PartialEq)]
pub struct Definition {
    pub name: String,
    pub kind: DefinitionKind,
    pub parameters: Vec<String>,
    /// Declared return type, without the language's separator (`->`, `:`).
    pub return_type: Option<String>,
    /// 1-based.
    pub start_line: usize,
    pub end_line: usize,
    /// 0-based column of the first character of the definition.
    pub column: usize,
    pub byte_range: Range<usize>,
}

impl Definition {
    pub fn has_return_type(&self) -> bool {
        self.return_type.is_some()
    }
}

/// A call to the language's print equivalent.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputCall {
    /// Normalized callee text, e.g. `print` or `fmt.Println`.
    pub callee: String,
    pub arguments: Vec<String>,
    /// 1-based.
    pub line: usize,
    pub callee_range: Range<usize>,
}

// ---------------------------------------------------------------------------
// Tree helpers
// ---------------------------------------------------------------------------

pub(crate) fn node_text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    &source[node.byte_range()]
}

/// Visit every node under `root` in pre-order (source order).
pub(crate) fn walk_preorder<'t>(root: Node<'t>, mut visit: impl FnMut(Node<'t>)) {
    let mut cursor = root.walk();
    loop {
        visit(cursor.node());
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

fn first_error_node(root: Node<'_>) -> Option<Node<'_>> {
    let mut found = None;
    walk_preorder(root, |node| {
        if found.is_none() && (node.is_error() || node.is_missing()) {
            found = Some(node);
        }
    });
    found
}

fn indent_width(line: &str) -> usize {
    line.len() - line.trim_start_matches([' ', '\t']).len()
}

/// Strip the common leading indentation of all non-blank lines. Only spaces
/// and tabs count as indentation.
pub fn dedent(source: &str) -> String {
    let indent = source
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(indent_width)
        .min()
        .unwrap_or(0);
    if indent == 0 {
        return source.to_string();
    }
    let mut out = String::with_capacity(source.len());
    for line in source.split_inclusive('\n') {
        if line.trim().is_empty() {
            out.push_str(line.trim_start_matches([' ', '\t']));
        } else {
            out.push_str(&line[indent..]);
        }
    }
    out
}

/// SHA-256 over the language label and the source text.
pub fn fingerprint(language: SourceLanguage, source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(language.label().as_bytes());
    hasher.update([0u8]);
    hasher.update(source.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Per-language extraction
// ---------------------------------------------------------------------------

fn parameter_names(language: SourceLanguage, params: Node<'_>, source: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        match (language, param.kind()) {
            (_, "comment") => {}
            (SourceLanguage::Python, "identifier")
            | (SourceLanguage::Python, "list_splat_pattern")
            | (SourceLanguage::Python, "dictionary_splat_pattern") => {
                names.push(node_text(param, source).to_string());
            }
            (SourceLanguage::Python, "typed_parameter") => {
                if let Some(inner) = param.named_child(0) {
                    names.push(node_text(inner, source).to_string());
                }
            }
            (SourceLanguage::Python, "default_parameter")
            | (SourceLanguage::Python, "typed_default_parameter") => {
                if let Some(name) = param.child_by_field_name("name") {
                    names.push(node_text(name, source).to_string());
                }
            }
            (SourceLanguage::TypeScript, "required_parameter")
            | (SourceLanguage::TypeScript, "optional_parameter") => {
                if let Some(pattern) = param.child_by_field_name("pattern") {
                    names.push(node_text(pattern, source).to_string());
                }
            }
            (SourceLanguage::Go, "parameter_declaration")
            | (SourceLanguage::Go, "variadic_parameter_declaration") => {
                let mut inner = param.walk();
                for name in param.children_by_field_name("name", &mut inner) {
                    names.push(node_text(name, source).to_string());
                }
            }
            (SourceLanguage::Java, "formal_parameter") => {
                if let Some(name) = param.child_by_field_name("name") {
                    names.push(node_text(name, source).to_string());
                }
            }
            (SourceLanguage::Java, "spread_parameter") => {
                let mut inner = param.walk();
                let declarator = param
                    .named_children(&mut inner)
                    .find(|child| child.kind() == "variable_declarator");
                if let Some(name) = declarator.and_then(|d| d.child_by_field_name("name")) {
                    names.push(node_text(name, source).to_string());
                }
            }
            _ => {}
        }
    }
    names
}

fn return_type(language: SourceLanguage, node: Node<'_>, source: &str) -> Option<String> {
    let field = match (language, node.kind()) {
        (SourceLanguage::Java, "constructor_declaration") => return None,
        (SourceLanguage::Java, _) => "type",
        (SourceLanguage::Go, _) => "result",
        _ => "return_type",
    };
    let annotation = node.child_by_field_name(field)?;
    let text = node_text(annotation, source)
        .trim()
        .trim_start_matches(':')
        .trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Name node of a definition. TypeScript arrow functions and function
/// expressions take the name of the declarator or class field they are
/// assigned to; anonymous ones have none.
pub(crate) fn definition_name<'t>(node: Node<'t>) -> Option<Node<'t>> {
    if let Some(name) = node.child_by_field_name("name") {
        return Some(name);
    }
    if !matches!(node.kind(), "arrow_function" | "function_expression") {
        return None;
    }
    let owner = node.parent()?;
    let assigned = matches!(owner.kind(), "variable_declarator" | "public_field_definition")
        && owner.child_by_field_name("value") == Some(node);
    if assigned {
        owner.child_by_field_name("name")
    } else {
        None
    }
}

fn definition_kind(language: SourceLanguage, node: Node<'_>, source: &str) -> DefinitionKind {
    match (language, node.kind()) {
        (SourceLanguage::Java, "constructor_declaration") => DefinitionKind::Constructor,
        (SourceLanguage::TypeScript, "method_definition")
            if node
                .child_by_field_name("name")
                .is_some_and(|name| node_text(name, source) == "constructor") =>
        {
            DefinitionKind::Constructor
        }
        (_, "method_definition") | (_, "method_declaration") => DefinitionKind::Method,
        (SourceLanguage::TypeScript, "arrow_function" | "function_expression")
            if node
                .parent()
                .is_some_and(|owner| owner.kind() == "public_field_definition") =>
        {
            DefinitionKind::Method
        }
        (SourceLanguage::Python, _) => {
            let in_class = node
                .parent()
                .filter(|p| p.kind() == "block")
                .and_then(|block| block.parent())
                .is_some_and(|owner| owner.kind() == "class_definition");
            if in_class {
                DefinitionKind::Method
            } else {
                DefinitionKind::Function
            }
        }
        _ => DefinitionKind::Function,
    }
}

fn extract_definition(language: SourceLanguage, node: Node<'_>, source: &str) -> Option<Definition> {
    let name = definition_name(node)?;
    let parameters = match node.child_by_field_name("parameters") {
        Some(params) => parameter_names(language, params, source),
        // `x => x`: a single bare parameter
        None => node
            .child_by_field_name("parameter")
            .map(|param| vec![node_text(param, source).to_string()])
            .unwrap_or_default(),
    };
    Some(Definition {
        name: node_text(name, source).to_string(),
        kind: definition_kind(language, node, source),
        parameters,
        return_type: return_type(language, node, source),
        start_line: node.start_position().row + 1,
        end_line: node.end_position().row + 1,
        column: node.start_position().column,
        byte_range: node.byte_range(),
    })
}

/// Normalized callee text and the byte range to rewrite when replacing it.
pub(crate) fn callee_of(
    language: SourceLanguage,
    call: Node<'_>,
    source: &str,
) -> Option<(String, Range<usize>)> {
    match language {
        SourceLanguage::Java => {
            let name = call.child_by_field_name("name")?;
            match call.child_by_field_name("object") {
                Some(object) => {
                    let object_text: String = node_text(object, source)
                        .chars()
                        .filter(|c| !c.is_whitespace())
                        .collect();
                    Some((
                        format!("{object_text}.{}", node_text(name, source)),
                        object.start_byte()..name.end_byte(),
                    ))
                }
                None => Some((node_text(name, source).to_string(), name.byte_range())),
            }
        }
        _ => {
            let function = call.child_by_field_name("function")?;
            let text: String = node_text(function, source)
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            Some((text, function.byte_range()))
        }
    }
}

fn call_arguments(call: Node<'_>, source: &str) -> Vec<String> {
    let Some(arguments) = call.child_by_field_name("arguments") else {
        return Vec::new();
    };
    let mut cursor = arguments.walk();
    arguments
        .named_children(&mut cursor)
        .filter(|arg| arg.kind() != "comment")
        .map(|arg| node_text(arg, source).to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// SourceModel
// ---------------------------------------------------------------------------

/// One parsed snapshot of source text plus its structural facts.
#[derive(Clone, Debug)]
pub struct SourceModel {
    language: SourceLanguage,
    source: String,
    tree: Tree,
    fingerprint: String,
    definitions: Vec<Definition>,
    output_calls: Vec<OutputCall>,
}

impl SourceModel {
    /// Parse `source` with the grammar of `language`.
    ///
    /// Fails with [`EvolveError::Parse`] when the tree contains any error or
    /// missing node.
    pub fn parse(language: SourceLanguage, source: impl Into<String>) -> EvolveResult<Self> {
        let source = source.into();
        let mut parser = new_parser(language)?;
        let tree = parser
            .parse(source.as_bytes(), None)
            .ok_or_else(|| EvolveError::parse(language.label(), "parser produced no tree", &source))?;

        let root = tree.root_node();
        if root.has_error() {
            let message = match first_error_node(root) {
                Some(node) => {
                    let pos = node.start_position();
                    format!(
                        "syntax error at line {}, column {}",
                        pos.row + 1,
                        pos.column + 1
                    )
                }
                None => "syntax error".to_string(),
            };
            return Err(EvolveError::parse(language.label(), message, &source));
        }

        let definition_kinds = language.definition_kinds();
        let call_kind = language.call_kind();
        let mut definitions = Vec::new();
        let mut output_calls = Vec::new();
        walk_preorder(root, |node| {
            let kind = node.kind();
            if definition_kinds.contains(&kind) {
                if let Some(def) = extract_definition(language, node, &source) {
                    definitions.push(def);
                }
            } else if kind == call_kind {
                if let Some((callee, callee_range)) = callee_of(language, node, &source) {
                    if language.is_output_callee(&callee) {
                        output_calls.push(OutputCall {
                            callee,
                            arguments: call_arguments(node, &source),
                            line: node.start_position().row + 1,
                            callee_range,
                        });
                    }
                }
            }
        });

        let fingerprint = fingerprint(language, &source);
        Ok(Self {
            language,
            source,
            tree,
            fingerprint,
            definitions,
            output_calls,
        })
    }

    pub fn language(&self) -> SourceLanguage {
        self.language
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub(crate) fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Every definition at any nesting depth, in source order.
    pub fn find_definitions(&self) -> &[Definition] {
        &self.definitions
    }

    /// Every call to the print equivalent, in source order.
    pub fn find_unstructured_output_calls(&self) -> &[OutputCall] {
        &self.output_calls
    }

    /// First definition named `name`.
    pub fn definition(&self, name: &str) -> Option<&Definition> {
        self.definitions.iter().find(|d| d.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PY_SOURCE: &str = r#"
def test_function(a: int, b: int) -> int:
    """Adds numbers."""
    print(f"Calculating sum of {a} and {b}")
    return a + b
"#;

    #[test]
    fn test_python_definitions_and_prints() {
        let model = SourceModel::parse(SourceLanguage::Python, PY_SOURCE).unwrap();
        let defs = model.find_definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "test_function");
        assert_eq!(defs[0].parameters, vec!["a", "b"]);
        assert_eq!(defs[0].return_type.as_deref(), Some("int"));
        assert_eq!(defs[0].start_line, 2);
        assert_eq!(defs[0].kind, DefinitionKind::Function);

        let prints = model.find_unstructured_output_calls();
        assert_eq!(prints.len(), 1);
        assert_eq!(prints[0].callee, "print");
        assert_eq!(prints[0].line, 4);
        assert!(prints[0].arguments[0].contains("Calculating sum of {a} and {b}"));
    }

    #[test]
    fn test_python_nested_and_unannotated() {
        let source = "def outer(x, y=2, *args, **kwargs):\n    def inner(z):\n        print(z, print(x))\n    return inner\n";
        let model = SourceModel::parse(SourceLanguage::Python, source).unwrap();
        let names: Vec<&str> = model.find_definitions().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["outer", "inner"]);
        assert_eq!(
            model.find_definitions()[0].parameters,
            vec!["x", "y", "*args", "**kwargs"]
        );
        assert!(model.find_definitions().iter().all(|d| !d.has_return_type()));
        // Outer print comes first, nested call second.
        let calls = model.find_unstructured_output_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].arguments, vec!["z", "print(x)"]);
        assert_eq!(calls[1].arguments, vec!["x"]);
    }

    #[test]
    fn test_python_method_kind() {
        let source = "class Greeter:\n    def greet(self) -> str:\n        return 'hi'\n";
        let model = SourceModel::parse(SourceLanguage::Python, source).unwrap();
        assert_eq!(model.find_definitions()[0].kind, DefinitionKind::Method);
        assert_eq!(model.find_definitions()[0].parameters, vec!["self"]);
    }

    #[test]
    fn test_python_attribute_print_is_not_output() {
        let source = "def f():\n    logger.print('x')\n    pprint('y')\n";
        let model = SourceModel::parse(SourceLanguage::Python, source).unwrap();
        assert!(model.find_unstructured_output_calls().is_empty());
    }

    #[test]
    fn test_parse_error_reports_text() {
        let source = "def broken(:\n    return\n";
        match SourceModel::parse(SourceLanguage::Python, source) {
            Err(EvolveError::Parse { source_text, message, .. }) => {
                assert_eq!(source_text, source);
                assert!(message.contains("line"));
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_go_definitions() {
        let source = r#"package main

import "fmt"

func add(a int, b int) int {
	fmt.Println("adding", a, b)
	return a + b
}

func (g *Greeter) Greet(name string) {
	fmt.Printf("hi %s\n", name)
}
"#;
        let model = SourceModel::parse(SourceLanguage::Go, source).unwrap();
        let defs = model.find_definitions();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].name, "add");
        assert_eq!(defs[0].parameters, vec!["a", "b"]);
        assert_eq!(defs[0].return_type.as_deref(), Some("int"));
        assert_eq!(defs[1].kind, DefinitionKind::Method);
        assert!(!defs[1].has_return_type());
        let calls = model.find_unstructured_output_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].callee, "fmt.Println");
        assert_eq!(calls[1].callee, "fmt.Printf");
    }

    #[test]
    fn test_typescript_definitions() {
        let source = "function add(a: number, b: number): number {\n  console.log(a);\n  return a + b;\n}\nfunction greet(name) {\n  return name;\n}\n";
        let model = SourceModel::parse(SourceLanguage::TypeScript, source).unwrap();
        let defs = model.find_definitions();
        assert_eq!(defs[0].return_type.as_deref(), Some("number"));
        assert_eq!(defs[0].parameters, vec!["a", "b"]);
        assert!(!defs[1].has_return_type());
        assert_eq!(model.find_unstructured_output_calls()[0].callee, "console.log");
    }

    #[test]
    fn test_typescript_constructor_kind() {
        let source = "class A {\n  constructor(x: number) {}\n  one(): number { return 1; }\n}\n";
        let model = SourceModel::parse(SourceLanguage::TypeScript, source).unwrap();
        let defs = model.find_definitions();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].name, "constructor");
        assert_eq!(defs[0].kind, DefinitionKind::Constructor);
        assert_eq!(defs[1].kind, DefinitionKind::Method);
    }

    #[test]
    fn test_typescript_function_values() {
        let source = "const double = (a) => a * 2;\nconst inc = x => x + 1;\nconst typed = function (a: number): number {\n  return a;\n};\nclass B {\n  handler = (e: string) => e;\n}\n[1, 2].map((n) => n);\n";
        let model = SourceModel::parse(SourceLanguage::TypeScript, source).unwrap();
        let defs = model.find_definitions();
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        // The anonymous callback has no name and is not a definition.
        assert_eq!(names, vec!["double", "inc", "typed", "handler"]);
        assert_eq!(defs[0].parameters, vec!["a"]);
        assert_eq!(defs[1].parameters, vec!["x"]);
        assert!(!defs[0].has_return_type());
        assert_eq!(defs[2].return_type.as_deref(), Some("number"));
        assert_eq!(defs[3].kind, DefinitionKind::Method);
    }

    #[test]
    fn test_java_definitions() {
        let source = "class Calc {\n  Calc() {}\n  int add(int a, int b) {\n    System.out.println(a + b);\n    return a + b;\n  }\n}\n";
        let model = SourceModel::parse(SourceLanguage::Java, source).unwrap();
        let defs = model.find_definitions();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].kind, DefinitionKind::Constructor);
        assert!(!defs[0].has_return_type());
        assert_eq!(defs[1].return_type.as_deref(), Some("int"));
        let calls = model.find_unstructured_output_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].callee, "System.out.println");
        assert_eq!(calls[0].arguments, vec!["a + b"]);
    }

    #[test]
    fn test_reparse_is_deterministic() {
        let first = SourceModel::parse(SourceLanguage::Python, PY_SOURCE).unwrap();
        let second = SourceModel::parse(SourceLanguage::Python, PY_SOURCE).unwrap();
        assert_eq!(first.find_definitions(), second.find_definitions());
        assert_eq!(
            first.find_unstructured_output_calls(),
            second.find_unstructured_output_calls()
        );
        assert_eq!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn test_fingerprint_depends_on_language() {
        assert_ne!(
            fingerprint(SourceLanguage::Python, "x"),
            fingerprint(SourceLanguage::Go, "x")
        );
    }

    #[test]
    fn test_dedent_ignores_non_ascii_whitespace() {
        // U+3000 is whitespace but not indentation; slicing by its width
        // would land inside the character.
        let source = "    def greet(self):\n        \"\"\"Say hi.\n\u{3000}\u{3000}more text\n        \"\"\"\n";
        assert_eq!(dedent(source), source);

        let nested = "    def f():\n    \u{3000}x = 1\n";
        assert_eq!(dedent(nested), "def f():\n\u{3000}x = 1\n");
    }

    #[test]
    fn test_dedent() {
        let source = "    def f():\n        return 1\n\n";
        assert_eq!(dedent(source), "def f():\n    return 1\n\n");
        assert_eq!(dedent("x = 1\n"), "x = 1\n");
    }
}
