//! dsl-typer
//!
//! Best-effort type annotations for ARC-DSL solvers: reads the return
//! annotations of the DSL library once, then labels the local variables of
//! solver functions and rewrites them with those labels for review by the
//! human-in-the-loop refactoring agent.

pub mod ast;
pub mod config;
pub mod constants;
pub mod error;
pub mod infer;
pub mod lexer;
pub mod parser;
pub mod refactor;
pub mod render;
pub mod signatures;
pub mod solvers;

pub use config::TyperConfig;
pub use constants::ConstantTypes;
pub use error::{Result, TyperError};
pub use infer::{AnalysisResult, CallableDetection, InferenceOptions, SolverTypeInference, VariableTypes};
pub use refactor::{apply_to_module, RefactoringPlan};
pub use render::render;
pub use signatures::SignatureTable;
pub use solvers::SolverModule;
