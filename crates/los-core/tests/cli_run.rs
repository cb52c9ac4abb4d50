//! End-to-end `los run` / `los markov` / `los check` tests against real files.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn los(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("los").expect("los binary should exist");
    cmd.current_dir(home)
        .env_remove("LOS_CONFIG")
        .env_remove("RUST_LOG")
        .env_remove("LOS_LOG")
        .env("XDG_CONFIG_HOME", home.join("xdg"))
        .env("HOME", home);
    cmd
}

fn table(n: usize, shift: usize) -> Value {
    let states = ["A", "B", "C"];
    let rows: Vec<Value> = (0..n)
        .map(|i| {
            let k = i + shift;
            json!({
                "Location": format!("L{}", k % 3 + 1),
                "Time Interval": format!("t{}", i % 6),
                "Speed Range (Km/hr)": (["10-20", "20-30", "30-40"][(k / 2) % 3]),
                "Level of Service Calculation": 0.2 + ((k * 13) % 17) as f64 / 10.0,
                "LOS": states[(k * 2 + k / 4) % 3],
            })
        })
        .collect();
    Value::Array(rows)
}

fn setup(with_afternoon: bool) -> TempDir {
    let home = TempDir::new().unwrap();
    let data = home.path().join("data");
    fs::create_dir_all(&data).unwrap();
    fs::write(data.join("morning.json"), table(40, 0).to_string()).unwrap();
    if with_afternoon {
        fs::write(data.join("Afternoon_Combined.json"), table(30, 7).to_string()).unwrap();
    }
    fs::write(
        home.path().join("config.yaml"),
        "data_dir: data\n\
         data_paths: { morning_data: data/morning.json }\n\
         features:\n  \
           clustering: [Location, Time Interval, Speed Range (Km/hr), Level of Service Calculation]\n  \
           markov: [LOS]\n\
         sessions:\n  \
           - { name: Morning, data_key: morning_data, clusters: 4 }\n  \
           - { name: Afternoon, clusters: 2 }\n",
    )
    .unwrap();
    home
}

fn stdout_json(output: &[u8]) -> Value {
    serde_json::from_slice(output).expect("stdout should be a single JSON document")
}

#[test]
fn run_all_sessions_clean() {
    let home = setup(true);
    let assert = los(home.path()).args(["-q", "run"]).assert().code(0);
    let summary = stdout_json(&assert.get_output().stdout);

    assert_eq!(summary["sessions"][0]["name"], "Morning");
    assert_eq!(summary["sessions"][0]["status"], "complete");
    assert_eq!(summary["sessions"][1]["status"], "complete");
    assert_eq!(summary["comparison"]["status"], "complete");
    assert_eq!(summary["config_hash"].as_str().map(str::len), Some(64));
    assert!(summary["run_id"].as_str().unwrap().starts_with("run-"));

    let out = home.path().join("output");
    assert!(out.join("morning_clustering.json").is_file());
    assert!(out.join("afternoon_stationary_distribution.json").is_file());
    assert!(out.join("stationary_comparison.json").is_file());
}

#[test]
fn run_with_missing_session_table_is_partial() {
    let home = setup(false);
    let assert = los(home.path()).args(["-q", "run"]).assert().code(3);
    let summary = stdout_json(&assert.get_output().stdout);

    assert_eq!(summary["sessions"][0]["status"], "complete");
    assert_eq!(summary["sessions"][1]["status"], "skipped");
    assert_eq!(summary["sessions"][1]["failures"][0]["kind"], "DataLoadError");
    assert_eq!(summary["sessions"][1]["failures"][0]["stage"], "load");
    assert_eq!(summary["comparison"]["status"], "skipped");
}

#[test]
fn run_single_session_to_custom_output() {
    let home = setup(false);
    los(home.path())
        .args(["-q", "run", "--session", "Morning", "--output-dir", "plots"])
        .assert()
        .code(0);
    let plots = home.path().join("plots");
    assert!(plots.join("morning_transition_matrix.json").is_file());
    assert!(!plots.join("stationary_comparison.json").exists());
    assert!(!home.path().join("output").exists());
}

#[test]
fn logs_go_to_stderr_as_jsonl() {
    let home = setup(true);
    let assert = los(home.path())
        .args(["--log-format", "jsonl", "run"])
        .assert()
        .code(0);
    let output = assert.get_output();
    stdout_json(&output.stdout);

    let stderr = String::from_utf8_lossy(&output.stderr);
    let events: Vec<Value> = stderr
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).expect("every log line is JSON"))
        .collect();
    assert!(events.iter().any(|e| e["event"] == "run.started"));
    assert!(events
        .iter()
        .any(|e| e["event"] == "cluster.finished" && e["session"] == "Morning" && e["stage"] == "cluster"));
}

#[test]
fn unknown_data_key_warns_and_falls_back() {
    let home = setup(true);
    let config = fs::read_to_string(home.path().join("config.yaml"))
        .unwrap()
        .replace("data_key: morning_data", "data_key: dawn_data");
    fs::write(home.path().join("config.yaml"), config).unwrap();
    fs::copy(
        home.path().join("data/morning.json"),
        home.path().join("data/Morning_Combined.json"),
    )
    .unwrap();

    let assert = los(home.path())
        .args(["--log-format", "jsonl", "run"])
        .assert()
        .code(0);
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).into_owned();
    let warning = stderr
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str::<Value>(l).expect("every log line is JSON"))
        .find(|e| e["event"] == "config.data_key_missing")
        .expect("missing data_key is logged");
    assert_eq!(warning["session"], "Morning");
    assert_eq!(warning["fields"]["data_key"], "dawn_data");
}

#[test]
fn markov_on_alternating_table() {
    let home = TempDir::new().unwrap();
    let rows: Vec<String> = ["A", "B", "A", "B", "A", "B"]
        .iter()
        .map(|s| {
            json!({"Location": "L1", "Time Interval": "t", "Speed Range (Km/hr)": "s", "LOS": s})
                .to_string()
        })
        .collect();
    fs::write(home.path().join("seq.jsonl"), rows.join("\n")).unwrap();

    let assert = los(home.path())
        .args(["-q", "markov", "seq.jsonl"])
        .assert()
        .code(0);
    let out = stdout_json(&assert.get_output().stdout);
    assert_eq!(out["states"], json!(["A", "B"]));
    assert_eq!(out["matrix"], json!([[0.0, 1.0], [1.0, 0.0]]));
    let pi: Vec<f64> = serde_json::from_value(out["stationary"].clone()).unwrap();
    assert!((pi[0] - 0.5).abs() < 1e-9 && (pi[1] - 0.5).abs() < 1e-9);
}

#[test]
fn markov_absorbing_void_flag() {
    let home = TempDir::new().unwrap();
    let rows = json!([
        {"Location": "L1", "Time Interval": "t", "Speed Range (Km/hr)": "s", "LOS": "A"},
        {"Location": "L1", "Time Interval": "t", "Speed Range (Km/hr)": "s", "LOS": "A"},
        {"Location": "L1", "Time Interval": "t", "Speed Range (Km/hr)": "s", "LOS": "B"}
    ]);
    fs::write(home.path().join("t.json"), rows.to_string()).unwrap();

    // The void row leaves no eigenvalue at 1, so the stationary step fails
    // but the matrix is still reported.
    let assert = los(home.path())
        .args(["-q", "markov", "--absorbing-void", "t.json"])
        .assert()
        .code(3)
        .stdout(predicate::str::contains("NoStationaryDistributionError"));
    let out = stdout_json(&assert.get_output().stdout);
    assert_eq!(out["void_states"], json!(["B"]));
    assert_eq!(out["matrix"], json!([[0.5, 0.5], [0.0, 0.0]]));
}

#[test]
fn invalid_session_is_skipped_and_the_other_runs() {
    let home = setup(true);
    let config = fs::read_to_string(home.path().join("config.yaml"))
        .unwrap()
        .replace("{ name: Afternoon, clusters: 2 }", "{ name: Afternoon, clusters: 0 }");
    fs::write(home.path().join("config.yaml"), config).unwrap();

    let assert = los(home.path()).args(["-q", "run"]).assert().code(3);
    let summary = stdout_json(&assert.get_output().stdout);
    assert_eq!(summary["sessions"][0]["status"], "complete");
    assert_eq!(summary["sessions"][1]["status"], "skipped");
    assert_eq!(summary["sessions"][1]["failures"][0]["kind"], "ConfigurationError");
    assert_eq!(summary["sessions"][1]["failures"][0]["stage"], "init");
    assert!(!home.path().join("output/afternoon_clustering.json").exists());

    let assert = los(home.path()).args(["-q", "check"]).assert().code(0);
    let out = stdout_json(&assert.get_output().stdout);
    assert_eq!(out["sessions"][1]["valid"], false);
    assert!(out["sessions"][1]["error"]
        .as_str()
        .unwrap()
        .contains("sessions[1].clusters"));
}

#[test]
fn check_reports_source_and_sessions() {
    let home = setup(false);
    let assert = los(home.path()).args(["-q", "check"]).assert().code(0);
    let out = stdout_json(&assert.get_output().stdout);
    assert_eq!(out["status"], "ok");
    assert_eq!(out["source"], "working directory");
    assert_eq!(out["sessions"][0]["data_exists"], true);
    assert_eq!(out["sessions"][0]["valid"], true);
    assert_eq!(out["sessions"][1]["data_exists"], false);
    assert_eq!(
        out["sessions"][1]["data_path"],
        "data/Afternoon_Combined.json"
    );
}

#[test]
fn config_env_var_is_used() {
    let home = setup(false);
    let elsewhere = TempDir::new().unwrap();
    los(elsewhere.path())
        .env("LOS_CONFIG", home.path().join("config.yaml"))
        .args(["-q", "check"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("environment variable"));
}

#[test]
fn version_prints_json() {
    let home = TempDir::new().unwrap();
    los(home.path())
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("los_version"));
}
