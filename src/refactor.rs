//! Refactoring plans for the human-in-the-loop agent
//!
//! A plan carries the annotated solver for review; once approved it is
//! applied to the solvers file with [`apply_to_module`].

use serde::Serialize;

use crate::error::{Result, TyperError};
use crate::infer::AnalysisResult;
use crate::render;

/// Proposed change to one solver
#[derive(Debug, Clone, Serialize)]
pub struct RefactoringPlan {
    pub file: String,
    pub solver: String,
    pub description: String,
    pub annotated_source: String,
    pub variables_annotated: usize,
    pub has_callables: bool,
}

impl RefactoringPlan {
    pub fn new(file: impl Into<String>, analysis: &AnalysisResult, annotated_source: String) -> Self {
        RefactoringPlan {
            file: file.into(),
            solver: analysis.solver_name.clone(),
            description: format!("Add type annotations to {}", analysis.solver_name),
            annotated_source,
            variables_annotated: analysis.variables.len(),
            has_callables: analysis.has_callables,
        }
    }
}

/// Annotate one solver inside the text of the whole solvers file.
///
/// The unannotated signature `def <solver>(<input>):` is looked up at any
/// indentation; the lines after it are rewritten up to the next `def`. When
/// the solver is defined more than once, the last definition is the one
/// rewritten, as it is the one Python keeps.
pub fn apply_to_module(
    module_source: &str,
    solver_name: &str,
    analysis: &AnalysisResult,
) -> Result<String> {
    let signature = format!("def {}({}):", solver_name, analysis.input_param);
    let lines: Vec<&str> = module_source.lines().collect();
    let start = lines
        .iter()
        .rposition(|line| line.trim().starts_with(&signature))
        .ok_or_else(|| TyperError::FunctionNotFound(solver_name.to_string()))?;

    let mut output: Vec<String> = lines[..start].iter().map(|line| line.to_string()).collect();
    let indent = lines[start].len() - lines[start].trim_start().len();
    output.push(format!(
        "{}{}",
        &lines[start][..indent],
        render::annotated_signature(solver_name, analysis)
    ));

    let mut in_solver = true;
    for line in &lines[start + 1..] {
        if in_solver && line.trim().starts_with("def ") {
            in_solver = false;
        }
        match render::annotate_line(line, analysis) {
            Some(rewritten) if in_solver => output.push(rewritten),
            _ => output.push(line.to_string()),
        }
    }

    let mut text = output.join("\n");
    if module_source.ends_with('\n') {
        text.push('\n');
    }
    Ok(text)
}
