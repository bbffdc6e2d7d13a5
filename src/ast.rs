//! Syntax tree definitions for DSL source files
//!
//! The tree is statement-level: function and class definitions are kept with
//! their signatures and nested bodies, everything else is reduced to a line
//! range. Return annotations are kept as full expressions so they can be
//! rendered back to text.

use std::fmt;

/// A complete source file
#[derive(Debug, Clone)]
pub struct Module {
    pub body: Vec<Statement>,
}

impl Module {
    /// Function definitions at the top level of the file, in source order
    pub fn functions(&self) -> impl Iterator<Item = &FunctionDef> {
        self.body.iter().filter_map(|stmt| match stmt {
            Statement::FunctionDef(def) => Some(def),
            _ => None,
        })
    }
}

/// Statements
#[derive(Debug, Clone)]
pub enum Statement {
    /// `def name(params) -> returns: body`
    FunctionDef(FunctionDef),

    /// `class Name(bases): body`
    ClassDef {
        name: String,
        body: Vec<Statement>,
        line: usize,
        end_line: usize,
    },

    /// Any other statement that owns an indented block: `if`, `for`, `with`,
    /// `else`, `match`, ...
    Compound {
        keyword: String,
        body: Vec<Statement>,
        line: usize,
        end_line: usize,
    },

    /// A single logical line
    Simple { line: usize, end_line: usize },
}

impl Statement {
    pub fn line(&self) -> usize {
        match self {
            Statement::FunctionDef(def) => def.line,
            Statement::ClassDef { line, .. }
            | Statement::Compound { line, .. }
            | Statement::Simple { line, .. } => *line,
        }
    }

    pub fn end_line(&self) -> usize {
        match self {
            Statement::FunctionDef(def) => def.end_line,
            Statement::ClassDef { end_line, .. }
            | Statement::Compound { end_line, .. }
            | Statement::Simple { end_line, .. } => *end_line,
        }
    }
}

/// Function definition
#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Parameter>,
    pub returns: Option<TypeExpr>,
    pub is_async: bool,
    pub body: Vec<Statement>,
    /// Line of the first decorator, or of `def` when undecorated
    pub line: usize,
    pub def_line: usize,
    pub end_line: usize,
}

/// Function parameter
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub kind: ParamKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Normal,
    /// `*args`
    VarPositional,
    /// `**kwargs`
    VarKeyword,
}

/// Type annotation expression
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    /// `Grid`
    Name(String),
    /// `typing.Callable`
    Attribute { value: Box<TypeExpr>, attr: String },
    /// `Tuple[int, int]`
    Subscript {
        value: Box<TypeExpr>,
        slice: Box<TypeExpr>,
    },
    /// `[Grid, Piece]`, as in the argument list of `Callable`
    List(Vec<TypeExpr>),
    /// `(int, int)`; also the comma-separated slice of a subscript
    Tuple(Vec<TypeExpr>),
    /// Forward reference: `'Grid'`
    Str(String),
    Number(String),
    None,
    Ellipsis,
    /// `A | B`
    Union(Box<TypeExpr>, Box<TypeExpr>),
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[TypeExpr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// Renders the way Python's `ast.unparse` prints annotations.
impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Name(name) => write!(f, "{}", name),
            TypeExpr::Attribute { value, attr } => write!(f, "{}.{}", value, attr),
            TypeExpr::Subscript { value, slice } => {
                write!(f, "{}[", value)?;
                match slice.as_ref() {
                    TypeExpr::Tuple(items) if !items.is_empty() => write_joined(f, items)?,
                    other => write!(f, "{}", other)?,
                }
                write!(f, "]")
            }
            TypeExpr::List(items) => {
                write!(f, "[")?;
                write_joined(f, items)?;
                write!(f, "]")
            }
            TypeExpr::Tuple(items) => {
                write!(f, "(")?;
                write_joined(f, items)?;
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            TypeExpr::Str(value) => {
                if value.contains('\'') && !value.contains('"') {
                    write!(f, "\"{}\"", value)
                } else {
                    write!(f, "'{}'", value.replace('\'', "\\'"))
                }
            }
            TypeExpr::Number(text) => write!(f, "{}", text),
            TypeExpr::None => write!(f, "None"),
            TypeExpr::Ellipsis => write!(f, "..."),
            TypeExpr::Union(left, right) => write!(f, "{} | {}", left, right),
        }
    }
}

/// Every function definition of a module, nested ones included, in the
/// order Python's `ast.walk` reaches them.
///
/// `ast.walk` is breadth-first, so a definition nested deeper comes after
/// every shallower one whatever its position in the file. Continuation
/// clauses are placed at the depth Python gives them: each `elif` opens an
/// `If` inside the previous `orelse`, and `except` bodies sit under an
/// `ExceptHandler` node.
pub fn walk_functions(module: &Module) -> Vec<&FunctionDef> {
    let mut found = Vec::new();
    collect_functions(&module.body, 1, &mut found);
    // Source order with depths; a stable sort by depth gives level order.
    found.sort_by_key(|(depth, _)| *depth);
    found.into_iter().map(|(_, def)| def).collect()
}

fn collect_functions<'m>(body: &'m [Statement], depth: usize, found: &mut Vec<(usize, &'m FunctionDef)>) {
    let mut elif_chain = 0;
    for stmt in body {
        match stmt {
            Statement::FunctionDef(def) => {
                found.push((depth, def));
                collect_functions(&def.body, depth + 1, found);
            }
            Statement::ClassDef { body, .. } => collect_functions(body, depth + 1, found),
            Statement::Compound { keyword, body, .. } => {
                let extra = match keyword.as_str() {
                    "elif" => {
                        elif_chain += 1;
                        elif_chain
                    }
                    "else" => std::mem::take(&mut elif_chain),
                    "except" => 1,
                    _ => {
                        elif_chain = 0;
                        0
                    }
                };
                collect_functions(body, depth + 1 + extra, found);
            }
            Statement::Simple { .. } => elif_chain = 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(n: &str) -> TypeExpr {
        TypeExpr::Name(n.to_string())
    }

    #[test]
    fn test_render_callable() {
        let expr = TypeExpr::Subscript {
            value: Box::new(name("Callable")),
            slice: Box::new(TypeExpr::Tuple(vec![
                TypeExpr::List(vec![name("Grid")]),
                name("Grid"),
            ])),
        };
        assert_eq!(expr.to_string(), "Callable[[Grid], Grid]");
    }

    fn walked(source: &str) -> Vec<(String, usize)> {
        let module = crate::parser::parse_module(source).unwrap();
        walk_functions(&module)
            .into_iter()
            .map(|def| (def.name.clone(), def.def_line))
            .collect()
    }

    #[test]
    fn test_walk_is_level_order() {
        let source = "\
def outer():
    def inner():
        def innermost():
            pass
    return inner
def second():
    pass
class Holder:
    def method(self):
        pass
";
        let order: Vec<String> = walked(source).into_iter().map(|(n, _)| n).collect();
        assert_eq!(order, vec!["outer", "second", "inner", "method", "innermost"]);
    }

    #[test]
    fn test_walk_clause_depths() {
        let source = "\
if a:
    def f(): pass
elif b:
    def f(): pass
else:
    def f(): pass
try:
    pass
except E:
    def g(): pass
def g(): pass
";
        // if body at depth 2, elif body 3, else after one elif 3;
        // except bodies sit one level under the handler
        assert_eq!(
            walked(source),
            vec![
                ("g".to_string(), 11),
                ("f".to_string(), 2),
                ("f".to_string(), 4),
                ("f".to_string(), 6),
                ("g".to_string(), 10),
            ]
        );
    }

    #[test]
    fn test_render_tuples_and_strings() {
        assert_eq!(TypeExpr::Tuple(vec![name("int")]).to_string(), "(int,)");
        assert_eq!(TypeExpr::Str("Grid".into()).to_string(), "'Grid'");
        assert_eq!(TypeExpr::Str("it's".into()).to_string(), "\"it's\"");
        let union = TypeExpr::Union(Box::new(name("int")), Box::new(TypeExpr::None));
        assert_eq!(union.to_string(), "int | None");
    }
}
