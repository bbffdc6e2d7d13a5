//! dsl-typer CLI
//!
//! Command-line interface for typing ARC-DSL solvers.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::*;
use tracing_subscriber::EnvFilter;

use dsl_typer::error::read_source;
use dsl_typer::{
    apply_to_module, AnalysisResult, RefactoringPlan, SignatureTable, SolverModule,
    SolverTypeInference, TyperConfig,
};

#[derive(Parser)]
#[command(name = "dsl-typer")]
#[command(author = "ARC-DSL Tooling Team")]
#[command(version)]
#[command(about = "dsl-typer - type annotations for ARC-DSL solvers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (default: ./dsl-typer.toml when present)
    #[arg(long, global = true, env = "DSL_TYPER_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// DSL library to read return annotations from
    #[arg(long, global = true, value_name = "FILE")]
    dsl: Option<PathBuf>,

    /// Solvers file to analyze
    #[arg(long, global = true, value_name = "FILE")]
    solvers: Option<PathBuf>,

    /// Log analysis details to stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Infer variable types for one solver and show the annotated code
    ///
    /// The `solve_` prefix is optional:
    ///   dsl-typer analyze 007bbfb7
    Analyze {
        /// Solver name, with or without the `solve_` prefix
        #[arg(value_name = "SOLVER")]
        solver: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Summarize the first solvers of the solvers file
    All {
        /// Number of solvers to show (0 for all)
        #[arg(long, default_value = "5")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write the DSL type mapping as JSON for the refactoring agents
    ExportJson {
        /// Destination file (default: paths.mapping_output)
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Print a solver with annotations, or write them into the solvers file
    Annotate {
        /// Solver name, with or without the `solve_` prefix
        #[arg(value_name = "SOLVER")]
        solver: String,
        /// Rewrite the solvers file in place
        #[arg(long)]
        write: bool,
    },
    /// List the DSL return annotations
    Signatures {
        /// Only functions returning a callable
        #[arg(long)]
        callable_only: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Resolved configuration for one invocation
struct Session {
    config: TyperConfig,
    dsl_file: PathBuf,
    solvers_file: PathBuf,
}

impl Session {
    fn new(cli: &Cli) -> anyhow::Result<Self> {
        let config = TyperConfig::load(cli.config.as_deref())?;
        let dsl_file = cli.dsl.clone().unwrap_or_else(|| config.paths.dsl_file.clone());
        let solvers_file = cli
            .solvers
            .clone()
            .unwrap_or_else(|| config.paths.solvers_file.clone());
        Ok(Session {
            config,
            dsl_file,
            solvers_file,
        })
    }

    fn signatures(&self) -> anyhow::Result<SignatureTable> {
        eprintln!("{}", "🔍 Analyzing DSL type signatures...".cyan());
        let table = SignatureTable::from_file(&self.dsl_file, self.config.callable_marker())?;
        eprintln!("   Found {} DSL functions", table.len());
        eprintln!(
            "   Identified {} Callable-returning functions",
            table.callable_count()
        );
        Ok(table)
    }

    fn inference<'t>(&self, table: &'t SignatureTable) -> SolverTypeInference<'t> {
        SolverTypeInference::new(
            table,
            self.config.constant_types(),
            self.config.inference_options(),
        )
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "dsl_typer=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = Session::new(&cli).and_then(|session| match &cli.command {
        Commands::Analyze { solver, json } => analyze_solver(&session, solver, *json),
        Commands::All { limit, json } => analyze_all(&session, *limit, *json),
        Commands::ExportJson { output } => export_json(&session, output.as_deref()),
        Commands::Annotate { solver, write } => annotate_solver(&session, solver, *write),
        Commands::Signatures {
            callable_only,
            json,
        } => list_signatures(&session, *callable_only, *json),
    });

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn rule() -> String {
    "=".repeat(60)
}

fn print_variables(analysis: &AnalysisResult, limit: usize) {
    for (name, label) in analysis.variables.iter().take(limit) {
        println!("    {}: {}", name.green(), label);
    }
}

fn analyze_solver(session: &Session, requested: &str, json: bool) -> anyhow::Result<()> {
    let table = session.signatures()?;
    let solvers = SolverModule::from_file(&session.solvers_file)?;
    let solver_name = solvers.resolve_name(requested)?;
    let source = solvers
        .function_source(&solver_name)
        .ok_or_else(|| anyhow::anyhow!("Solver {} not found", solver_name))?;

    let inference = session.inference(&table);
    let analysis = inference.analyze(source, &solver_name);
    let annotated = dsl_typer::render(source, &solver_name, &analysis);
    let plan = RefactoringPlan::new(
        session.solvers_file.display().to_string(),
        &analysis,
        annotated.clone(),
    );

    if json {
        let report = serde_json::json!({
            "analysis": analysis,
            "plan": plan,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("\n{}", format!("📋 Analysis for {}:", solver_name).yellow().bold());
    println!("\nVariables ({}):", analysis.variables.len());
    for (name, label) in analysis.variables.iter() {
        println!("  {}: {}", name.green(), label);
    }
    println!("\nHas Callables: {}", analysis.has_callables);

    println!("\n{}", rule());
    println!("{}", "Generated Annotated Code:".cyan().bold());
    println!("{}", rule());
    println!("{}", annotated);

    println!("\n{}", rule());
    println!("{}", "HITL Refactoring Plan:".cyan().bold());
    println!("{}", rule());
    println!("File: {}", plan.file);
    println!("Description: {}", plan.description);
    println!("Variables to annotate: {}", plan.variables_annotated);

    Ok(())
}

fn analyze_all(session: &Session, limit: usize, json: bool) -> anyhow::Result<()> {
    let table = session.signatures()?;
    let solvers = SolverModule::from_file(&session.solvers_file)?;
    let inference = session.inference(&table);

    let names = solvers.solver_names();
    let shown = if limit == 0 { names.len() } else { limit.min(names.len()) };

    let results: Vec<AnalysisResult> = names
        .iter()
        .take(shown)
        .filter_map(|name| {
            solvers
                .function_source(name)
                .map(|source| inference.analyze(source, name))
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    println!("\n{}", format!("📊 Analyzing {} solvers...", names.len()).yellow().bold());
    for analysis in &results {
        println!("\n{}:", analysis.solver_name.bold());
        println!("  Variables: {}", analysis.variables.len());
        println!("  Has Callables: {}", analysis.has_callables);
        print_variables(analysis, 3);
    }

    Ok(())
}

fn export_json(session: &Session, output: Option<&Path>) -> anyhow::Result<()> {
    let table = session.signatures()?;
    let output = output.unwrap_or(session.config.paths.mapping_output.as_path());
    table.export(output)?;

    println!("{} Exported type mapping to {}", "✓".green(), output.display());
    println!("   This can be used by your refactoring agents!");
    Ok(())
}

fn annotate_solver(session: &Session, requested: &str, write: bool) -> anyhow::Result<()> {
    let table = session.signatures()?;
    let text = read_source(&session.solvers_file)?;
    let solvers = SolverModule::parse(&text)?;
    let solver_name = solvers.resolve_name(requested)?;
    let source = solvers
        .function_source(&solver_name)
        .ok_or_else(|| anyhow::anyhow!("Solver {} not found", solver_name))?;

    let inference = session.inference(&table);
    let analysis = inference.analyze(source, &solver_name);

    if !write {
        println!("{}", dsl_typer::render(source, &solver_name, &analysis));
        return Ok(());
    }

    let updated = apply_to_module(&text, &solver_name, &analysis)?;
    fs::write(&session.solvers_file, updated)?;
    println!(
        "{} Annotated {} variables of {} in {}",
        "✓".green(),
        analysis.variables.len(),
        solver_name,
        session.solvers_file.display()
    );
    Ok(())
}

fn list_signatures(session: &Session, callable_only: bool, json: bool) -> anyhow::Result<()> {
    let table = session.signatures()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&table)?);
        return Ok(());
    }

    for (name, label) in table.return_types() {
        let callable = table.is_callable_function(name);
        if callable_only && !callable {
            continue;
        }
        let marker = if callable { " (callable)".magenta().to_string() } else { String::new() };
        println!("{} -> {}{}", name.green(), label, marker);
    }
    Ok(())
}
