//! Python entity extraction using tree-sitter-python.
//!
//! Pure function from (path, source) to parsed entities: no filesystem
//! access, no global state beyond the thread-local parser pool. Scope is
//! tracked through a stack of enclosing class/function names so that
//! qualified names read `module.Class.method`.

use std::collections::BTreeSet;
use std::time::Duration;

use sha2::{Digest, Sha256};

use super::pool::with_python_parser;
use super::{ParsedClass, ParsedFunction, ParsedParameter};

/// Extract functions and classes from one Python file.
///
/// Returns `Ok(None)` when the file does not parse (callers skip it with
/// a warning) and `Err` when the per-file deadline elapsed.
pub fn extract_entities(
    rel_path: &str,
    module_path: &str,
    source: &[u8],
    timeout: Duration,
) -> anyhow::Result<Option<(Vec<ParsedFunction>, Vec<ParsedClass>)>> {
    let tree = with_python_parser(|parser| {
        parser.set_timeout_micros(timeout.as_micros().min(u64::MAX as u128) as u64);
        let tree = parser.parse(source, None);
        parser.set_timeout_micros(0);
        tree
    })?;

    let tree = match tree {
        Some(tree) => tree,
        // parse() returns None only on timeout or external cancellation
        None => anyhow::bail!("parse timed out for {rel_path}"),
    };
    if tree.root_node().has_error() {
        return Ok(None);
    }

    let mut extractor = Extractor {
        source,
        rel_path,
        module_path,
        scope: Vec::new(),
        functions: Vec::new(),
        classes: Vec::new(),
    };
    extractor.walk(tree.root_node());
    Ok(Some((extractor.functions, extractor.classes)))
}

struct Extractor<'a> {
    source: &'a [u8],
    rel_path: &'a str,
    module_path: &'a str,
    scope: Vec<String>,
    functions: Vec<ParsedFunction>,
    classes: Vec<ParsedClass>,
}

impl Extractor<'_> {
    fn walk(&mut self, node: tree_sitter::Node) {
        match node.kind() {
            "function_definition" => {
                if let Some(name) = self.field_text(&node, "name") {
                    if let Some(function) = self.extract_function(&node, &name) {
                        self.functions.push(function);
                    }
                    // nested defs and classes are scoped under this one
                    self.scope.push(name);
                    self.walk_children(node);
                    self.scope.pop();
                    return;
                }
            }
            "class_definition" => {
                if let Some(name) = self.field_text(&node, "name") {
                    let class_index = self.classes.len();
                    let class = self.extract_class(&node, &name);
                    self.classes.push(class);

                    let method_floor = self.functions.len();
                    self.scope.push(name);
                    self.walk_children(node);
                    let class_qname = self.scope.join(".");
                    self.scope.pop();

                    // immediate children only: exactly one level below the class
                    let prefix = format!("{}.{}.", self.module_path, class_qname);
                    let methods: Vec<String> = self.functions[method_floor..]
                        .iter()
                        .filter(|f| {
                            f.qualified_name
                                .strip_prefix(&prefix)
                                .map_or(false, |rest| !rest.contains('.'))
                        })
                        .map(|f| f.qualified_name.clone())
                        .collect();
                    self.classes[class_index].methods = methods;
                    return;
                }
            }
            _ => {}
        }
        self.walk_children(node);
    }

    fn walk_children(&mut self, node: tree_sitter::Node) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk(child);
        }
    }

    fn extract_function(&self, node: &tree_sitter::Node, name: &str) -> Option<ParsedFunction> {
        let body = node.child_by_field_name("body")?;
        let parameters = self.extract_parameters(node);
        let return_type = self.field_text(node, "return_type");
        let docstring = self.extract_docstring(&body);

        let params_text = node
            .child_by_field_name("parameters")
            .and_then(|p| self.node_text(&p))
            .unwrap_or_else(|| "()".to_string());
        let is_async = node
            .child(0)
            .map(|c| c.kind() == "async")
            .unwrap_or(false);
        let mut signature = format!("def {name}{params_text}");
        if let Some(ret) = &return_type {
            signature.push_str(" -> ");
            signature.push_str(ret);
        }
        if is_async {
            signature = format!("async {signature}");
        }

        let body_start = body.start_position().row;
        let body_end = body.end_position().row;
        let body_lines = body_end.saturating_sub(body_start) + 1;

        let body_bytes = self
            .source
            .get(body.start_byte()..body.end_byte())
            .unwrap_or_default();
        let body_hash = format!("{:x}", Sha256::digest(body_bytes));

        let mut calls = BTreeSet::new();
        self.collect_calls(&body, &mut calls);

        Some(ParsedFunction {
            qualified_name: self.qualified(name),
            name: name.to_string(),
            module_path: self.module_path.to_string(),
            parameters,
            return_type,
            docstring,
            signature,
            file: self.rel_path.to_string(),
            start_line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
            body_lines,
            body_hash,
            calls,
        })
    }

    fn extract_class(&self, node: &tree_sitter::Node, name: &str) -> ParsedClass {
        let parents = node
            .child_by_field_name("superclasses")
            .map(|superclasses| {
                let mut out = Vec::new();
                let mut cursor = superclasses.walk();
                for child in superclasses.named_children(&mut cursor) {
                    match child.kind() {
                        "identifier" | "attribute" => {
                            if let Some(text) = self.node_text(&child) {
                                out.push(text);
                            }
                        }
                        // keyword arguments (metaclass=...) are not parents
                        _ => {}
                    }
                }
                out
            })
            .unwrap_or_default();

        let docstring = node
            .child_by_field_name("body")
            .and_then(|body| self.extract_docstring(&body));

        ParsedClass {
            qualified_name: self.qualified(name),
            name: name.to_string(),
            module_path: self.module_path.to_string(),
            parents,
            methods: Vec::new(),
            docstring,
            file: self.rel_path.to_string(),
            start_line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
        }
    }

    fn extract_parameters(&self, node: &tree_sitter::Node) -> Vec<ParsedParameter> {
        let mut out = Vec::new();
        let Some(params) = node.child_by_field_name("parameters") else {
            return out;
        };
        let mut cursor = params.walk();
        for child in params.named_children(&mut cursor) {
            match child.kind() {
                "identifier" => {
                    if let Some(name) = self.node_text(&child) {
                        out.push(ParsedParameter {
                            name,
                            type_text: None,
                            default_text: None,
                        });
                    }
                }
                "typed_parameter" => {
                    let name = child
                        .named_child(0)
                        .and_then(|n| self.node_text(&n));
                    if let Some(name) = name {
                        out.push(ParsedParameter {
                            name,
                            type_text: child
                                .child_by_field_name("type")
                                .and_then(|t| self.node_text(&t)),
                            default_text: None,
                        });
                    }
                }
                "default_parameter" => {
                    let name = child
                        .child_by_field_name("name")
                        .and_then(|n| self.node_text(&n));
                    if let Some(name) = name {
                        out.push(ParsedParameter {
                            name,
                            type_text: None,
                            default_text: child
                                .child_by_field_name("value")
                                .and_then(|v| self.node_text(&v)),
                        });
                    }
                }
                "typed_default_parameter" => {
                    let name = child
                        .child_by_field_name("name")
                        .and_then(|n| self.node_text(&n));
                    if let Some(name) = name {
                        out.push(ParsedParameter {
                            name,
                            type_text: child
                                .child_by_field_name("type")
                                .and_then(|t| self.node_text(&t)),
                            default_text: child
                                .child_by_field_name("value")
                                .and_then(|v| self.node_text(&v)),
                        });
                    }
                }
                "list_splat_pattern" => {
                    if let Some(inner) = child.named_child(0).and_then(|n| self.node_text(&n)) {
                        out.push(ParsedParameter {
                            name: format!("*{inner}"),
                            type_text: None,
                            default_text: None,
                        });
                    }
                }
                "dictionary_splat_pattern" => {
                    if let Some(inner) = child.named_child(0).and_then(|n| self.node_text(&n)) {
                        out.push(ParsedParameter {
                            name: format!("**{inner}"),
                            type_text: None,
                            default_text: None,
                        });
                    }
                }
                _ => {}
            }
        }
        out
    }

    /// First statement of a block, when it is a plain string literal.
    fn extract_docstring(&self, body: &tree_sitter::Node) -> Option<String> {
        let first = body.named_child(0)?;
        if first.kind() != "expression_statement" {
            return None;
        }
        let string_node = first.named_child(0)?;
        if string_node.kind() != "string" {
            return None;
        }
        let raw = self.node_text(&string_node)?;
        Some(strip_string_quotes(&raw))
    }

    fn collect_calls(&self, node: &tree_sitter::Node, calls: &mut BTreeSet<String>) {
        if node.kind() == "call" {
            if let Some(function) = node.child_by_field_name("function") {
                if let Some(text) = self.node_text(&function) {
                    calls.insert(text);
                }
            }
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.collect_calls(&child, calls);
        }
    }

    fn qualified(&self, name: &str) -> String {
        if self.scope.is_empty() {
            format!("{}.{}", self.module_path, name)
        } else {
            format!("{}.{}.{}", self.module_path, self.scope.join("."), name)
        }
    }

    fn field_text(&self, node: &tree_sitter::Node, field: &str) -> Option<String> {
        node.child_by_field_name(field)
            .and_then(|child| self.node_text(&child))
    }

    fn node_text(&self, node: &tree_sitter::Node) -> Option<String> {
        let bytes = self.source.get(node.start_byte()..node.end_byte())?;
        std::str::from_utf8(bytes).ok().map(|s| s.to_string())
    }
}

/// Strip string prefixes (`r`, `b`, `f`, ...) and quote runs from a
/// string literal's source text.
fn strip_string_quotes(raw: &str) -> String {
    let trimmed = raw.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    for quotes in ["\"\"\"", "'''", "\"", "'"] {
        if trimmed.starts_with(quotes) && trimmed.len() >= 2 * quotes.len() {
            let inner = &trimmed[quotes.len()..trimmed.len() - quotes.len()];
            return inner.trim().to_string();
        }
    }
    trimmed.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(source: &str) -> (Vec<ParsedFunction>, Vec<ParsedClass>) {
        extract_entities("pkg/core.py", "pkg.core", source.as_bytes(), Duration::from_secs(60))
            .unwrap()
            .expect("source should parse")
    }

    #[test]
    fn top_level_function() {
        let (functions, classes) = extract("def create(path):\n    return path\n");
        assert!(classes.is_empty());
        assert_eq!(functions.len(), 1);
        let f = &functions[0];
        assert_eq!(f.qualified_name, "pkg.core.create");
        assert_eq!(f.name, "create");
        assert_eq!(f.module_path, "pkg.core");
        assert_eq!(f.file, "pkg/core.py");
        assert_eq!(f.start_line, 1);
        assert_eq!(f.signature, "def create(path)");
    }

    #[test]
    fn parameters_with_types_and_defaults() {
        let (functions, _) = extract(
            "def make(name: str, count: int = 3, *args, **kwargs):\n    return name\n",
        );
        let params = &functions[0].parameters;
        assert_eq!(params.len(), 4);
        assert_eq!(params[0].name, "name");
        assert_eq!(params[0].type_text.as_deref(), Some("str"));
        assert!(params[0].required());
        assert_eq!(params[1].name, "count");
        assert_eq!(params[1].type_text.as_deref(), Some("int"));
        assert_eq!(params[1].default_text.as_deref(), Some("3"));
        assert!(!params[1].required());
        assert_eq!(params[2].name, "*args");
        assert_eq!(params[3].name, "**kwargs");
    }

    #[test]
    fn return_type_in_signature() {
        let (functions, _) = extract("def count() -> int:\n    return 0\n");
        assert_eq!(functions[0].return_type.as_deref(), Some("int"));
        assert_eq!(functions[0].signature, "def count() -> int");
    }

    #[test]
    fn async_signature_prefixed() {
        let (functions, _) = extract("async def fetch(url):\n    return url\n");
        assert_eq!(functions[0].signature, "async def fetch(url)");
    }

    #[test]
    fn docstrings_extracted_and_unquoted() {
        let (functions, _) =
            extract("def doc():\n    \"\"\"First line.\n\n    More.\n    \"\"\"\n    return 1\n");
        let docstring = functions[0].docstring.as_deref().unwrap();
        assert!(docstring.starts_with("First line."));
        assert!(!docstring.contains("\"\"\""));
    }

    #[test]
    fn class_with_parents_and_methods() {
        let source = "\
class Thing(Base, mixin.Extra):
    \"\"\"A thing.\"\"\"

    def start(self):
        return 1

    def stop(self):
        return 0
";
        let (functions, classes) = extract(source);
        assert_eq!(classes.len(), 1);
        let class = &classes[0];
        assert_eq!(class.qualified_name, "pkg.core.Thing");
        assert_eq!(class.parents, vec!["Base", "mixin.Extra"]);
        assert_eq!(
            class.methods,
            vec!["pkg.core.Thing.start", "pkg.core.Thing.stop"]
        );
        assert_eq!(class.docstring.as_deref(), Some("A thing."));

        assert_eq!(functions.len(), 2);
        assert_eq!(functions[0].qualified_name, "pkg.core.Thing.start");
    }

    #[test]
    fn nested_class_methods_not_counted_as_outer_methods() {
        let source = "\
class Outer:
    def method(self):
        return 1

    class Inner:
        def inner_method(self):
            return 2
";
        let (_, classes) = extract(source);
        let outer = classes.iter().find(|c| c.name == "Outer").unwrap();
        assert_eq!(outer.methods, vec!["pkg.core.Outer.method"]);
        let inner = classes.iter().find(|c| c.name == "Inner").unwrap();
        assert_eq!(inner.qualified_name, "pkg.core.Outer.Inner");
        assert_eq!(inner.methods, vec!["pkg.core.Outer.Inner.inner_method"]);
    }

    #[test]
    fn called_names_collected() {
        let source = "\
def caller():
    helper()
    os.path.join('a', 'b')
    return helper()
";
        let (functions, _) = extract(source);
        let calls = &functions[0].calls;
        assert!(calls.contains("helper"));
        assert!(calls.contains("os.path.join"));
        assert_eq!(calls.len(), 2);
    }

    #[test]
    fn body_hash_is_deterministic_and_content_sensitive() {
        let (a, _) = extract("def f():\n    return 1\n");
        let (b, _) = extract("def f():\n    return 1\n");
        let (c, _) = extract("def f():\n    return 2\n");
        assert_eq!(a[0].body_hash, b[0].body_hash);
        assert_ne!(a[0].body_hash, c[0].body_hash);
    }

    #[test]
    fn body_lines_counted() {
        let (functions, _) = extract("def f():\n    a = 1\n    b = 2\n    return a + b\n");
        assert_eq!(functions[0].body_lines, 3);
        assert_eq!(functions[0].end_line, 4);
    }

    #[test]
    fn decorated_functions_still_extracted() {
        let (functions, _) = extract("@wraps\ndef wrapped():\n    return 1\n");
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].name, "wrapped");
    }

    #[test]
    fn invalid_syntax_reports_none() {
        let result = extract_entities(
            "bad.py",
            "bad",
            b"def broken(:\n",
            Duration::from_secs(60),
        )
        .unwrap();
        assert!(result.is_none());
    }
}
