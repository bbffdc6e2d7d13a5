//! Best-effort variable typing for solver functions
//!
//! Solvers are straight-line functions of the form
//!
//! ```text
//! def solve_xyz(I):
//!     x1 = objects(I, T, F, T)
//!     x2 = argmax(x1, size)
//!     O = subgrid(x2, I)
//!     return O
//! ```
//!
//! Every `name = call(...)` line is typed by looking the called name up in
//! the [`SignatureTable`], then in the [`ConstantTypes`]; the output variable
//! falls back to the grid type when neither knows the name. This is a textual
//! heuristic over lines, not a parser: tuple targets, several `=` on one
//! line, or calls spread over several lines are typed wrongly or not at all.

use lazy_static::lazy_static;
use regex::Regex;
use serde::ser::{Serialize, Serializer};
use serde::Deserialize;
use tracing::{debug, trace};

use crate::constants::ConstantTypes;
use crate::render;
use crate::signatures::SignatureTable;

lazy_static! {
    static ref CALL_SITE: Regex = Regex::new(r"([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap();
}

/// Assignment token searched for on each body line
pub(crate) const ASSIGN: &str = " = ";

/// How `has_callables` is detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallableDetection {
    /// Every whitespace-separated word before the first `(` of any line of
    /// the function, the definition line included.
    #[default]
    LeadingTokens,
    /// Every identifier directly followed by `(` on a body line, nested
    /// calls included.
    CallSites,
}

/// Names and labels fixed by the solver convention
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceOptions {
    /// Input parameter used when the definition line does not name one
    pub input_param: String,
    /// Variable holding the solver result
    pub output_name: String,
    /// Label of both the input and the output
    pub grid_type: String,
    /// Label the output variable with `grid_type` even when the call that
    /// produced it is typed otherwise
    pub output_always_grid: bool,
    pub callable_detection: CallableDetection,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        InferenceOptions {
            input_param: "I".to_string(),
            output_name: "O".to_string(),
            grid_type: "Grid".to_string(),
            output_always_grid: false,
            callable_detection: CallableDetection::default(),
        }
    }
}

/// Variable name to type label, in order of first assignment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableTypes {
    entries: Vec<(String, String)>,
}

impl VariableTypes {
    /// Record a label. A variable assigned again keeps its position and
    /// takes the new label.
    pub fn insert(&mut self, name: impl Into<String>, label: impl Into<String>) {
        let name = name.into();
        let label = label.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = label,
            None => self.entries.push((name, label)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, label)| label.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, l)| (n.as_str(), l.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for VariableTypes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

/// Outcome of analyzing one solver
#[derive(Debug, Clone, serde::Serialize)]
pub struct AnalysisResult {
    pub solver_name: String,
    pub variables: VariableTypes,
    pub has_callables: bool,
    /// Parameter the input label was attached to
    #[serde(skip)]
    pub input_param: String,
    #[serde(skip)]
    pub grid_type: String,
}

/// Text before the first `(`, trimmed; the whole expression when there is none.
pub fn candidate_call_name(expression: &str) -> &str {
    expression.split('(').next().unwrap_or(expression).trim()
}

/// Split `target = expression` at the first assignment token.
pub(crate) fn split_assignment(line: &str) -> Option<(&str, &str)> {
    line.split_once(ASSIGN)
        .map(|(target, expression)| (target.trim(), expression))
}

/// First parameter named on a definition line: `def solve_x(I):` gives `I`.
pub(crate) fn declared_input(def_line: &str) -> Option<&str> {
    let open = def_line.find('(')?;
    let params = &def_line[open + 1..];
    let first = params.split([',', ')']).next()?;
    let name = first.split([':', '=']).next()?.trim();
    if !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        Some(name)
    } else {
        None
    }
}

/// Lines of a function with trailing blank lines removed.
pub(crate) fn source_lines(source: &str) -> Vec<&str> {
    source.trim_end().lines().collect()
}

/// Index one past the last body line: a final `return` line is excluded.
pub(crate) fn body_end(lines: &[&str]) -> usize {
    match lines.last() {
        Some(last) if lines.len() > 1 && last.trim_start().starts_with("return") => lines.len() - 1,
        _ => lines.len(),
    }
}

/// Types the local variables of solver functions
pub struct SolverTypeInference<'t> {
    signatures: &'t SignatureTable,
    constants: ConstantTypes,
    options: InferenceOptions,
}

impl<'t> SolverTypeInference<'t> {
    pub fn new(
        signatures: &'t SignatureTable,
        constants: ConstantTypes,
        options: InferenceOptions,
    ) -> Self {
        SolverTypeInference {
            signatures,
            constants,
            options,
        }
    }

    pub fn options(&self) -> &InferenceOptions {
        &self.options
    }

    pub fn signatures(&self) -> &SignatureTable {
        self.signatures
    }

    /// Infer variable types for one solver function.
    pub fn analyze(&self, source: &str, solver_name: &str) -> AnalysisResult {
        let lines = source_lines(source);
        let input_param = lines
            .first()
            .and_then(|line| declared_input(line))
            .unwrap_or(self.options.input_param.as_str())
            .to_string();

        let mut variables = VariableTypes::default();
        variables.insert(input_param.clone(), self.options.grid_type.clone());

        let end = body_end(&lines);
        for line in lines.iter().take(end).skip(1) {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            let Some((var_name, expression)) = split_assignment(line) else {
                continue;
            };
            if let Some(label) = self.label_for(var_name, expression) {
                trace!(variable = var_name, label = %label, "typed assignment");
                variables.insert(var_name, label);
            } else {
                trace!(variable = var_name, "no type for assignment");
            }
        }

        let has_callables = self.has_callables(&lines);
        debug!(
            solver = solver_name,
            variables = variables.len(),
            has_callables,
            "analyzed solver"
        );

        AnalysisResult {
            solver_name: solver_name.to_string(),
            variables,
            has_callables,
            input_param,
            grid_type: self.options.grid_type.clone(),
        }
    }

    /// Analyze a solver and rewrite it with the inferred annotations.
    pub fn annotate(&self, source: &str, solver_name: &str) -> String {
        let analysis = self.analyze(source, solver_name);
        render::render(source, solver_name, &analysis)
    }

    /// Signature, then constant, then the output fallback.
    fn label_for(&self, var_name: &str, expression: &str) -> Option<String> {
        let is_output = var_name == self.options.output_name;
        if is_output && self.options.output_always_grid {
            return Some(self.options.grid_type.clone());
        }
        let call = candidate_call_name(expression);
        if let Some(label) = self.signatures.return_type(call) {
            Some(label.to_string())
        } else if let Some(label) = self.constants.get(call) {
            Some(label.to_string())
        } else if is_output {
            Some(self.options.grid_type.clone())
        } else {
            None
        }
    }

    fn has_callables(&self, lines: &[&str]) -> bool {
        match self.options.callable_detection {
            CallableDetection::LeadingTokens => lines.iter().any(|line| {
                candidate_call_name(line)
                    .split_whitespace()
                    .any(|token| self.signatures.is_callable_function(token))
            }),
            CallableDetection::CallSites => lines
                .iter()
                .skip(1)
                .filter(|line| !line.trim_start().starts_with('#'))
                .flat_map(|line| CALL_SITE.captures_iter(line))
                .any(|caps| self.signatures.is_callable_function(&caps[1])),
        }
    }
}
