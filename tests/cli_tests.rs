//! Integration tests for dsl-typer CLI commands
//!
//! Tests the CLI commands: analyze, all, export-json, annotate, signatures

use std::fs;
use std::path::PathBuf;
use std::process::Command;

fn fixture(name: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
        .display()
        .to_string()
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("dsl_typer_cli_{}_{}", std::process::id(), name))
}

/// Helper to run dsl-typer and capture output
fn run_typer(args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_dsl-typer"))
        .args(args)
        .current_dir(env!("CARGO_MANIFEST_DIR"))
        .env_remove("DSL_TYPER_CONFIG")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute dsl-typer");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

/// Run with the fixture DSL and solvers files
fn run_on_fixtures(args: &[&str]) -> (String, String, i32) {
    let dsl = fixture("dsl.py");
    let solvers = fixture("solvers.py");
    let mut full = vec!["--dsl", dsl.as_str(), "--solvers", solvers.as_str()];
    full.extend_from_slice(args);
    run_typer(&full)
}

// ============================================================================
// dsl-typer analyze tests
// ============================================================================

#[test]
fn test_analyze_solver() {
    let (stdout, stderr, code) = run_on_fixtures(&["analyze", "1f85a75f"]);
    assert_eq!(code, 0, "analyze should succeed: {}", stderr);
    assert!(stderr.contains("Found 16 DSL functions"));
    assert!(stderr.contains("Identified 4 Callable-returning functions"));
    assert!(stdout.contains("Analysis for solve_1f85a75f"));
    assert!(stdout.contains("def solve_1f85a75f(I: Grid) -> Grid:"));
    assert!(stdout.contains("x1: Objects = objects(I, T, T, T)"));
    assert!(stdout.contains("Add type annotations to solve_1f85a75f"));
}

#[test]
fn test_analyze_json() {
    let (stdout, _, code) = run_on_fixtures(&["analyze", "solve_d631b094", "--json"]);
    assert_eq!(code, 0);

    let json: serde_json::Value =
        serde_json::from_str(&stdout).expect("analyze --json should output valid JSON");
    assert_eq!(json["analysis"]["solver_name"], "solve_d631b094");
    assert_eq!(json["analysis"]["has_callables"], true);
    assert_eq!(json["analysis"]["variables"]["x1"], "Callable");
    assert_eq!(json["analysis"]["variables"]["x2"], "Integer");
    assert_eq!(json["plan"]["variables_annotated"], 4);
}

#[test]
fn test_analyze_unknown_solver() {
    let (_, stderr, code) = run_on_fixtures(&["analyze", "deadbeef"]);
    assert_ne!(code, 0, "analyze should fail for an unknown solver");
    assert!(stderr.contains("solve_deadbeef"));
}

#[test]
fn test_missing_dsl_file() {
    let solvers = fixture("solvers.py");
    let (_, stderr, code) = run_typer(&[
        "--dsl",
        "tests/fixtures/nonexistent.py",
        "--solvers",
        solvers.as_str(),
        "analyze",
        "1f85a75f",
    ]);
    assert_ne!(code, 0, "analyze should fail when the DSL file is missing");
    assert!(stderr.contains("Source not found"));
}

// ============================================================================
// dsl-typer all tests
// ============================================================================

#[test]
fn test_all_respects_limit() {
    let (stdout, _, code) = run_on_fixtures(&["all", "--limit", "2", "--json"]);
    assert_eq!(code, 0);

    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let results = json.as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["solver_name"], "solve_67a3c6ac");
    assert_eq!(results[1]["variables"]["x1"], "Piece");
}

#[test]
fn test_all_text() {
    let (stdout, _, code) = run_on_fixtures(&["all", "--limit", "0"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Analyzing 5 solvers"));
    assert!(stdout.contains("solve_d631b094"));
}

// ============================================================================
// dsl-typer export-json tests
// ============================================================================

#[test]
fn test_export_json() {
    let output = temp_path("mapping.json");
    let output_arg = output.display().to_string();
    let (stdout, _, code) = run_on_fixtures(&["export-json", "--output", output_arg.as_str()]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Exported type mapping to"));

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(json["type_mapping"]["compose"], "Callable");
    assert_eq!(json["callable_functions"].as_array().unwrap().len(), 4);

    let _ = fs::remove_file(&output);
}

// ============================================================================
// dsl-typer signatures tests
// ============================================================================

#[test]
fn test_signatures_callable_only() {
    let (stdout, _, code) = run_on_fixtures(&["signatures", "--callable-only"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("compose"));
    assert!(stdout.contains("make_scaler"));
    assert!(!stdout.contains("objects"));
}

#[test]
fn test_signatures_json() {
    let (stdout, _, code) = run_on_fixtures(&["signatures", "--json"]);
    assert_eq!(code, 0);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["type_mapping"]["vmirror"], "Piece");
}

// ============================================================================
// dsl-typer annotate tests
// ============================================================================

#[test]
fn test_annotate_prints_solver() {
    let (stdout, _, code) = run_on_fixtures(&["annotate", "6fa7a44f"]);
    assert_eq!(code, 0);
    assert_eq!(
        stdout.trim_end(),
        "def solve_6fa7a44f(I: Grid) -> Grid:\n    x1: Piece = vmirror(I)\n    O: Grid = hconcat(I, x1)\n    return O"
    );
}

#[test]
fn test_annotate_write() {
    let solvers = temp_path("solvers.py");
    fs::copy(fixture("solvers.py"), &solvers).unwrap();
    let dsl = fixture("dsl.py");
    let solvers_arg = solvers.display().to_string();

    let (_, stderr, code) = run_typer(&[
        "--dsl",
        dsl.as_str(),
        "--solvers",
        solvers_arg.as_str(),
        "annotate",
        "67a3c6ac",
        "--write",
    ]);
    assert_eq!(code, 0, "annotate --write should succeed: {}", stderr);

    let updated = fs::read_to_string(&solvers).unwrap();
    assert!(updated.contains("def solve_67a3c6ac(I: Grid) -> Grid:\n    O: Piece = vmirror(I)\n"));
    assert!(updated.contains("def solve_6fa7a44f(I):\n"));

    let _ = fs::remove_file(&solvers);
}

// ============================================================================
// configuration tests
// ============================================================================

#[test]
fn test_config_file() {
    let config = temp_path("dsl-typer.toml");
    fs::write(
        &config,
        format!(
            "[paths]\ndsl_file = {:?}\nsolvers_file = {:?}\n\n[inference]\ngrid_type = \"Board\"\n",
            fixture("dsl.py"),
            fixture("solvers.py")
        ),
    )
    .unwrap();
    let config_arg = config.display().to_string();

    let (stdout, _, code) = run_typer(&["--config", config_arg.as_str(), "annotate", "67a3c6ac"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("def solve_67a3c6ac(I: Board) -> Board:"));
    // the output keeps the label of the call that produced it
    assert!(stdout.contains("O: Piece = vmirror(I)"));

    let _ = fs::remove_file(&config);
}

#[test]
fn test_config_output_always_grid() {
    let config = temp_path("grid-dsl-typer.toml");
    fs::write(&config, "[inference]\noutput_always_grid = true\n").unwrap();
    let config_arg = config.display().to_string();

    let (stdout, _, code) = run_on_fixtures(&["--config", config_arg.as_str(), "annotate", "67a3c6ac"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("O: Grid = vmirror(I)"));

    let _ = fs::remove_file(&config);
}

#[test]
fn test_invalid_config_file() {
    let config = temp_path("bad-dsl-typer.toml");
    fs::write(&config, "[inference]\nunknown_key = true\n").unwrap();
    let config_arg = config.display().to_string();

    let (_, stderr, code) = run_on_fixtures(&["--config", config_arg.as_str(), "signatures"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("Invalid configuration"));

    let _ = fs::remove_file(&config);
}
