//! Rewrites a solver with the annotations found by the inferrer

use crate::infer::{split_assignment, AnalysisResult};

/// `def solve_x(I: Grid) -> Grid:`
pub fn annotated_signature(solver_name: &str, analysis: &AnalysisResult) -> String {
    format!(
        "def {}({}: {}) -> {}:",
        solver_name, analysis.input_param, analysis.grid_type, analysis.grid_type
    )
}

/// Annotate one assignment line when its variable has a label.
///
/// Returns `None` for comments, `return` lines, lines without a simple
/// assignment and untyped variables.
pub fn annotate_line(line: &str, analysis: &AnalysisResult) -> Option<String> {
    let stripped = line.trim();
    if stripped.starts_with('#') || stripped.starts_with("return") {
        return None;
    }
    let (var_name, expression) = split_assignment(stripped)?;
    let label = analysis.variables.get(var_name)?;
    let indent = line.len() - line.trim_start().len();
    Some(format!(
        "{}{}: {} = {}",
        &line[..indent],
        var_name,
        label,
        expression
    ))
}

/// Render the solver source with its signature and assignments annotated.
///
/// Pure text transform: the output is not re-parsed.
pub fn render(source: &str, solver_name: &str, analysis: &AnalysisResult) -> String {
    let mut lines = source.trim_end().lines();
    let mut annotated = Vec::new();

    if lines.next().is_some() {
        annotated.push(annotated_signature(solver_name, analysis));
    }
    for line in lines {
        match annotate_line(line, analysis) {
            Some(rewritten) => annotated.push(rewritten),
            None => annotated.push(line.trim_end().to_string()),
        }
    }

    annotated.join("\n")
}
