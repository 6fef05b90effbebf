use serde_json::Value;
use std::fs;
use std::process::{Command, Output};
use tempfile::TempDir;

struct Sandbox {
    home: TempDir,
    pwd: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self {
            home: TempDir::new().expect("home tempdir should be created"),
            pwd: TempDir::new().expect("pwd tempdir should be created"),
        }
    }

    fn write_local_source(&self, name: &str, contents: &str) {
        fs::write(self.pwd.path().join(format!("{name}.json")), contents)
            .expect("local source should be written");
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_solparam"))
            .args(args)
            .current_dir(self.pwd.path())
            .env_remove("SOLPARAM_DATA_DIR")
            .env("SOLPARAM_HOME", self.home.path())
            .env_remove("RUST_LOG")
            .output()
            .expect("solparam should run")
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn sources_lists_builtin_and_working_directory_tiers() {
    let sandbox = Sandbox::new();
    sandbox.write_local_source("lab", r#"{"GaAs": {"band_gap": "1.40 eV"}}"#);

    let output = sandbox.run(&["sources", "--json"]);
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));

    let listing: Value = serde_json::from_str(&stdout(&output)).expect("listing should be JSON");
    let entries = listing.as_array().expect("listing should be an array");
    let names: Vec<&str> = entries
        .iter()
        .map(|entry| entry["name"].as_str().expect("name should be a string"))
        .collect();
    assert_eq!(names, ["simple", "lab"]);
    assert_eq!(entries[0]["priority"], 0);
    assert_eq!(entries[1]["priority"], 10);
}

#[test]
fn get_resolves_temperature_dependent_gap() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["get", "GaAs", "band_gap", "--input", "T=300 K", "--json"]);
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));

    let result: Value = serde_json::from_str(&stdout(&output)).expect("result should be JSON");
    let gap = &result["band_gap"];
    let expected = 1.519 - 5.405e-4 * 90000.0 / 504.0;
    let magnitude = gap["magnitude"].as_f64().expect("magnitude should be numeric");
    assert!((magnitude - expected).abs() < 1.0e-12);
    assert_eq!(gap["unit"], "electron_volt");
    assert_eq!(gap["source"], "simple");
}

#[test]
fn get_prints_one_line_per_parameter() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&[
        "get",
        "InGaAs",
        "lattice_constant",
        "electron_mass",
        "--comp",
        "In=0.53",
    ]);
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));

    let text = stdout(&output);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("lattice_constant = 5.8"));
    assert!(lines[0].ends_with("angstrom [simple]"));
    assert!(lines[1].starts_with("electron_mass = "));
}

#[test]
fn working_directory_source_overrides_builtin_data() {
    let sandbox = Sandbox::new();
    sandbox.write_local_source("simple", r#"{"GaAs": {"band_gap": "1.40 eV"}}"#);

    let output = sandbox.run(&["get", "GaAs", "band_gap"]);
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output).trim(), "band_gap = 1.4 electron_volt [simple]");
}

#[test]
fn missing_input_exits_with_diagnostic() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["get", "GaAs", "band_gap"]);

    assert_eq!(output.status.code(), Some(3));
    assert!(stderr(&output).contains("ERROR: [INPUT.ARGUMENT_MISSING]"));
    assert!(stderr(&output).contains("'T'"));
}

#[test]
fn unknown_parameter_exits_as_missing() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["get", "GaAs", "hole_mass"]);

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("ERROR: [PARAM.NOT_FOUND]"));
}

#[test]
fn stray_json_in_the_working_directory_does_not_break_lookups() {
    let sandbox = Sandbox::new();
    sandbox.write_local_source("package", r#"{"name": "webapp", "version": "1.0.0"}"#);

    let output = sandbox.run(&["get", "Si", "band_gap"]);
    assert_eq!(output.status.code(), Some(2), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("ERROR: [PARAM.NOT_FOUND]"));
    assert!(stderr(&output).contains("[simple, package]"));
}

#[test]
fn materials_and_parameters_list_source_contents() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["materials", "simple", "--json"]);
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    let materials: Vec<String> =
        serde_json::from_str(&stdout(&output)).expect("materials should be JSON");
    assert_eq!(materials, ["GaAs", "InAs", "AlAs", "InGaAs", "AlGaAs"]);

    let output = sandbox.run(&["parameters", "simple", "GaAs"]);
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    assert!(stdout(&output).lines().any(|line| line.starts_with("band_gap: Direct")));
    assert!(stdout(&output).lines().any(|line| line == "nk"));

    let output = sandbox.run(&["materials", "nowhere"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("PARAM.UNKNOWN_SOURCE"));
}

#[test]
fn nk_prints_a_wavelength_table() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["nk", "GaAs"]);
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));

    let text = stdout(&output);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 6);
    assert_eq!(lines[0], "wavelength n k");
    assert_eq!(lines[1], "400 4.373 2.146");
}

#[test]
fn malformed_flags_are_usage_errors() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["get", "InGaAs", "band_gap", "--comp", "In"]);
    assert_eq!(output.status.code(), Some(4));
    assert!(stderr(&output).contains("INPUT.CLI_USAGE"));

    let output = sandbox.run(&["--help"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("sources"));
}
