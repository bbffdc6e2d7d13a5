//! Signature table for the DSL library
//!
//! Maps every annotated DSL function to the text of its return annotation
//! and remembers which of them hand back another function.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ast::walk_functions;
use crate::error::{read_source, Result, TyperError};
use crate::parser::parse_module;

/// Substring of a rendered return annotation that marks a function-valued result
pub const DEFAULT_CALLABLE_MARKER: &str = "Callable";

/// Return annotations of the DSL, keyed by function name.
///
/// Serializes to the `{"type_mapping": {..}, "callable_functions": [..]}`
/// document consumed by the refactoring agents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureTable {
    #[serde(rename = "type_mapping")]
    return_types: BTreeMap<String, String>,
    callable_functions: BTreeSet<String>,
}

impl SignatureTable {
    /// Build the table from DSL source text.
    pub fn build(source: &str) -> Result<Self> {
        Self::with_marker(source, DEFAULT_CALLABLE_MARKER)
    }

    /// Build the table, flagging annotations that contain `marker` as callable.
    pub fn with_marker(source: &str, marker: &str) -> Result<Self> {
        let module = parse_module(source)?;
        let mut table = SignatureTable::default();
        // `async def` is a different node kind and is not part of the DSL.
        for def in walk_functions(&module).into_iter().filter(|def| !def.is_async) {
            if let Some(returns) = &def.returns {
                table.record(&def.name, def.def_line, returns.to_string(), marker);
            }
        }
        Ok(table)
    }

    /// Later records replace earlier ones, callable flag included.
    fn record(&mut self, name: &str, line: usize, rendered: String, marker: &str) {
        if self.return_types.contains_key(name) {
            debug!(function = name, line, "redefinition replaces earlier signature");
        }
        if rendered.contains(marker) {
            self.callable_functions.insert(name.to_string());
        } else {
            self.callable_functions.remove(name);
        }
        self.return_types.insert(name.to_string(), rendered);
    }

    /// Read and parse a DSL file.
    pub fn from_file(path: impl AsRef<Path>, marker: &str) -> Result<Self> {
        let path = path.as_ref();
        let source = read_source(path)?;
        let table = Self::with_marker(&source, marker)?;
        info!(
            path = %path.display(),
            functions = table.len(),
            callables = table.callable_count(),
            "built signature table"
        );
        Ok(table)
    }

    /// Load a table previously written by [`SignatureTable::export`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = read_source(path)?;
        let table: SignatureTable = serde_json::from_str(&text)?;
        if let Some(name) = table
            .callable_functions
            .iter()
            .find(|name| !table.return_types.contains_key(*name))
        {
            return Err(TyperError::Json(serde::de::Error::custom(format!(
                "callable function `{}` has no entry in type_mapping",
                name
            ))));
        }
        info!(path = %path.display(), functions = table.len(), "loaded type mapping");
        Ok(table)
    }

    /// Write the table as pretty JSON, replacing any existing file.
    pub fn export(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!(path = %path.display(), "exported type mapping");
        Ok(())
    }

    pub fn return_type(&self, function_name: &str) -> Option<&str> {
        self.return_types.get(function_name).map(String::as_str)
    }

    pub fn is_callable_function(&self, function_name: &str) -> bool {
        self.callable_functions.contains(function_name)
    }

    pub fn return_types(&self) -> &BTreeMap<String, String> {
        &self.return_types
    }

    pub fn callable_functions(&self) -> &BTreeSet<String> {
        &self.callable_functions
    }

    pub fn len(&self) -> usize {
        self.return_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.return_types.is_empty()
    }

    pub fn callable_count(&self) -> usize {
        self.callable_functions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DSL: &str = "\
from typing import Callable

def head(x) -> Piece:
    return x[0]

def compose(f) -> Callable[[Grid], Grid]:
    return lambda g: f(g)

def identity(x):
    return x
";

    #[test]
    fn test_build_scenario() {
        let table = SignatureTable::build(DSL).unwrap();
        assert_eq!(table.return_type("head"), Some("Piece"));
        assert_eq!(table.return_type("compose"), Some("Callable[[Grid], Grid]"));
        assert_eq!(table.return_type("identity"), None);
        assert_eq!(table.len(), 2);
        assert!(table.is_callable_function("compose"));
        assert!(!table.is_callable_function("head"));
        assert_eq!(table.callable_count(), 1);
    }

    #[test]
    fn test_nested_definitions_are_collected() {
        let source = "def outer() -> Callable:\n    def inner(x) -> Integer:\n        return x\n    return inner\n";
        let table = SignatureTable::build(source).unwrap();
        assert_eq!(table.return_type("inner"), Some("Integer"));
        assert!(table.is_callable_function("outer"));
    }

    #[test]
    fn test_last_definition_wins() {
        let source = "def f() -> Callable:\n    pass\n\ndef f() -> Grid:\n    pass\n";
        let table = SignatureTable::build(source).unwrap();
        assert_eq!(table.return_type("f"), Some("Grid"));
        assert!(!table.is_callable_function("f"));
    }

    #[test]
    fn test_deeper_definition_is_visited_last() {
        let source = "\
def outer():
    def f() -> Nested:
        pass
    return f

def f() -> Top:
    pass
";
        let table = SignatureTable::build(source).unwrap();
        assert_eq!(table.return_type("f"), Some("Nested"));
    }

    #[test]
    fn test_async_definitions_are_skipped() {
        let source = "async def fetch() -> Callable:\n    def inner() -> Grid:\n        pass\n    return inner\n";
        let table = SignatureTable::build(source).unwrap();
        assert_eq!(table.return_type("fetch"), None);
        assert_eq!(table.return_type("inner"), Some("Grid"));
        assert_eq!(table.callable_count(), 0);
    }

    #[test]
    fn test_load_rejects_unmapped_callable() {
        let path = std::env::temp_dir().join(format!("dsl_typer_unmapped_{}.json", std::process::id()));
        fs::write(
            &path,
            r#"{"type_mapping": {"head": "Piece"}, "callable_functions": ["compose"]}"#,
        )
        .unwrap();
        let err = SignatureTable::load(&path).unwrap_err();
        let _ = fs::remove_file(&path);
        match err {
            TyperError::Json(e) => assert!(e.to_string().contains("compose")),
            other => panic!("expected a JSON error, got {:?}", other),
        }
    }

    #[test]
    fn test_callables_are_a_subset_of_mapped_names() {
        let table = SignatureTable::build(DSL).unwrap();
        assert!(table
            .callable_functions()
            .iter()
            .all(|name| table.return_types().contains_key(name)));
    }

    #[test]
    fn test_custom_marker() {
        let table = SignatureTable::with_marker(DSL, "Piece").unwrap();
        assert!(table.is_callable_function("head"));
        assert!(!table.is_callable_function("compose"));
    }

    #[test]
    fn test_invalid_source() {
        let err = SignatureTable::build("def broken(:\n").unwrap_err();
        assert!(matches!(err, TyperError::ParseError { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = SignatureTable::from_file("/nonexistent/dsl.py", DEFAULT_CALLABLE_MARKER).unwrap_err();
        assert!(matches!(err, TyperError::SourceNotFound { .. }));
    }

    #[test]
    fn test_json_shape() {
        let table = SignatureTable::build(DSL).unwrap();
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["type_mapping"]["head"], "Piece");
        assert_eq!(json["callable_functions"], serde_json::json!(["compose"]));
        assert_eq!(json.as_object().unwrap().len(), 2);
    }
}
