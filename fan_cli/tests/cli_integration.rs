use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::{Path, PathBuf};
use assert_cmd::Command;
use tempfile::tempdir;

// Short plan for the simulated backend; run under an accelerated clock.
const FAST_CONFIG: &str = r#"
[pins]
tach_gpio = 4
pwm_gpio = 19

[sampling]
sample_interval_s = 1
settle_s = 2
inter_repetition_s = 0

[[phase]]
duration_min = 1
duty_pct = 50
repetitions = 2
"#;

fn write_config(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fan.toml");
    fs::write(&path, body).unwrap();
    path
}

fn fan_cmd(cfg: &Path) -> Command {
    let mut cmd = Command::cargo_bin("fan_cli").unwrap();
    cmd.arg("--config")
        .arg(cfg)
        .arg("--log-level")
        .arg("warn")
        .env("FAN_TEST_TIME_SCALE", "600")
        .env_remove("RUST_LOG");
    cmd
}

fn raw_files(dir: &Path) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.to_string_lossy().ends_with("_RAW.csv"))
        .collect()
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["self-check", "--duty", "96"], 2, "96", "stderr")]
#[case(&["bogus"], 2, "unrecognized subcommand", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let mut cmd = Command::cargo_bin("fan_cli").unwrap();
    for a in args {
        cmd.arg(a);
    }
    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn run_writes_raw_and_summary_csv() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), FAST_CONFIG);
    let out = dir.path().join("data");

    fan_cmd(&cfg)
        .arg("run")
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Test complete: 2 repetition(s)"));

    let main = fs::read_to_string(out.join("FILE_MAIN.csv")).unwrap();
    let lines: Vec<_> = main.lines().collect();
    assert_eq!(
        lines[0],
        "RUN,PHASE,REPETITION,DURATION_MIN,PWM_PCT,AVG_RPM,CANCELLED"
    );
    assert_eq!(lines.len(), 3);
    assert!(lines[1].contains(",1,1,1,50,"), "{}", lines[1]);
    assert!(lines[2].contains(",1,2,1,50,"), "{}", lines[2]);
    assert!(lines[1..].iter().all(|l| l.ends_with(",false")));

    let raws = raw_files(&out);
    assert_eq!(raws.len(), 1);
    let raw = fs::read_to_string(&raws[0]).unwrap();
    let mut raw_lines = raw.lines();
    assert_eq!(
        raw_lines.next(),
        Some("TIMESTAMP,PHASE,REPETITION,DURATION_MIN,PWM_PCT,RPM")
    );
    assert!(raw_lines.count() >= 20, "expected one row per poll");
}

#[rstest]
fn second_run_appends_to_summary() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), FAST_CONFIG);
    let out = dir.path().join("data");
    for _ in 0..2 {
        fan_cmd(&cfg)
            .arg("run")
            .arg("--output")
            .arg(&out)
            .assert()
            .success();
    }
    let main = fs::read_to_string(out.join("FILE_MAIN.csv")).unwrap();
    let headers = main.lines().filter(|l| l.starts_with("RUN,")).count();
    assert_eq!(headers, 1);
    assert_eq!(main.lines().count(), 5);
    assert_eq!(raw_files(&out).len(), 2);
}

#[rstest]
fn json_mode_prints_one_object_per_repetition() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), FAST_CONFIG);
    let out = dir.path().join("data");

    let output = fan_cmd(&cfg)
        .arg("--json")
        .arg("run")
        .arg("--output")
        .arg(&out)
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let objs: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).expect("each stdout line is JSON"))
        .collect();
    assert_eq!(objs.len(), 3);
    assert_eq!(objs[0]["phase"], 1);
    assert_eq!(objs[1]["repetition"], 2);
    assert_eq!(objs[2]["repetitions"], 2);
    assert_eq!(objs[2]["cancelled"], false);
}

#[rstest]
fn hardware_init_failure_is_fatal() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), FAST_CONFIG);
    fan_cmd(&cfg)
        .arg("run")
        .arg("--output")
        .arg(dir.path().join("data"))
        .env("FAN_TEST_SIM_FAIL_INIT", "1")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("GPIO hardware failed"));
}

#[rstest]
fn hardware_init_failure_json() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), FAST_CONFIG);
    let output = fan_cmd(&cfg)
        .arg("--json")
        .arg("run")
        .arg("--output")
        .arg(dir.path().join("data"))
        .env("FAN_TEST_SIM_FAIL_INIT", "1")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    let last = stderr.lines().last().unwrap();
    let v: serde_json::Value = serde_json::from_str(last).unwrap();
    assert_eq!(v["reason"], "HardwareFault");
}

#[rstest]
#[case("[[phase]]\nduration_min = 1\nduty_pct = 96\n", "Configuration is invalid")]
#[case("[pins]\ntach_gpio = 4\npwm_gpio = 4\n", "must differ")]
#[case("[sampling\n", "Configuration is invalid")]
#[case("", "1 to 10 phases")]
fn bad_config_exits_with_error(#[case] body: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), body);
    fan_cmd(&cfg)
        .arg("run")
        .arg("--output")
        .arg(dir.path().join("data"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains(needle));
}

#[rstest]
fn invalid_config_reports_config_reason_in_json() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), "[pins]\ntach_gpio = 4\npwm_gpio = 4\n");
    let output = fan_cmd(&cfg).arg("--json").arg("run").output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    let v: serde_json::Value = serde_json::from_str(stderr.lines().last().unwrap()).unwrap();
    assert_eq!(v["reason"], "Config");
    assert!(v["message"].as_str().unwrap().contains("must differ"));
}

#[rstest]
fn missing_config_file_is_reported() {
    let dir = tempdir().unwrap();
    fan_cmd(&dir.path().join("nope.toml"))
        .arg("run")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("config file could not be read"));
}

#[rstest]
fn interactive_session_runs_entered_plan() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), FAST_CONFIG);
    let out = dir.path().join("data");

    // 1 phase: 1 min at 50%, 1 repetition; start with "1"; EOF at "press 2".
    fan_cmd(&cfg)
        .arg("interactive")
        .arg("--output")
        .arg(&out)
        .write_stdin("1\n1\n50\n1\n1\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("press '1'"))
        .stdout(predicate::str::contains("Test complete: 1 repetition(s)"))
        .stdout(predicate::str::contains("press '2'"));

    let main = fs::read_to_string(out.join("FILE_MAIN.csv")).unwrap();
    assert_eq!(main.lines().count(), 2);
}

#[rstest]
fn interactive_zero_phases_exits_cleanly() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), FAST_CONFIG);
    fan_cmd(&cfg)
        .arg("interactive")
        .arg("--output")
        .arg(dir.path().join("data"))
        .write_stdin("0\n")
        .assert()
        .success();
    assert!(!dir.path().join("data").exists());
}

#[rstest]
fn self_check_reports_speed() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), FAST_CONFIG);
    let mut cmd = Command::cargo_bin("fan_cli").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("self-check")
        .arg("--seconds")
        .arg("1")
        .env_remove("FAN_TEST_TIME_SCALE")
        .assert()
        .success()
        .stdout(predicate::str::contains("self-check ok"));
}
