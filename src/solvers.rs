//! Index of the functions defined in a solvers file

use std::path::Path;

use tracing::{info, warn};

use crate::error::{read_source, Result, TyperError};
use crate::ast::ParamKind;
use crate::parser::parse_module;

/// Prefix shared by all solver functions
pub const SOLVER_PREFIX: &str = "solve_";

/// A top-level function and its exact source text
#[derive(Debug, Clone)]
pub struct FunctionSource {
    pub name: String,
    /// 1-based line of the definition (first decorator included)
    pub line: usize,
    /// Parameter names; `*args` and `**kwargs` included
    pub params: Vec<String>,
    pub source: String,
}

/// Parsed solvers file
#[derive(Debug, Clone)]
pub struct SolverModule {
    functions: Vec<FunctionSource>,
}

impl SolverModule {
    pub fn parse(source: &str) -> Result<Self> {
        let module = parse_module(source)?;
        let lines: Vec<&str> = source.lines().collect();

        let functions = module
            .functions()
            .map(|def| {
                let single_input = def.params.len() == 1 && def.params[0].kind == ParamKind::Normal;
                if def.name.starts_with(SOLVER_PREFIX) && !single_input {
                    warn!(
                        solver = %def.name,
                        line = def.def_line,
                        params = def.params.len(),
                        "solver does not take a single input grid"
                    );
                }
                let start = def.line.saturating_sub(1);
                let end = def.end_line.min(lines.len());
                FunctionSource {
                    name: def.name.clone(),
                    line: def.line,
                    params: def.params.iter().map(|p| p.name.clone()).collect(),
                    source: lines[start..end.max(start)].join("\n"),
                }
            })
            .collect();

        Ok(SolverModule { functions })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let module = Self::parse(&read_source(path)?)?;
        info!(
            path = %path.display(),
            solvers = module.solver_names().len(),
            "indexed solvers file"
        );
        Ok(module)
    }

    /// Names of the `solve_*` functions, in order of first definition.
    pub fn solver_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for name in self.functions.iter().map(|f| f.name.as_str()) {
            if name.starts_with(SOLVER_PREFIX) && !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Source of a top-level function; a later definition shadows an earlier one.
    pub fn function(&self, name: &str) -> Option<&FunctionSource> {
        self.functions.iter().rev().find(|f| f.name == name)
    }

    pub fn function_source(&self, name: &str) -> Option<&str> {
        self.function(name).map(|f| f.source.as_str())
    }

    /// Accept `solve_abc` as well as the bare `abc`.
    pub fn resolve_name(&self, requested: &str) -> Result<String> {
        let name = if requested.starts_with(SOLVER_PREFIX) {
            requested.to_string()
        } else {
            format!("{}{}", SOLVER_PREFIX, requested)
        };
        if self.function(&name).is_some() {
            Ok(name)
        } else {
            Err(TyperError::FunctionNotFound(name))
        }
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
