use fan_config::{load_file, load_toml};
use rstest::rstest;
use std::fs;
use tempfile::tempdir;

const BASE: &str = r#"
[pins]
tach_gpio = 4
pwm_gpio = 19

[tach]
pulses_per_rev = 2.0
weighting = 0.3
min_rpm = 5.0

[sampling]
sample_interval_s = 10
settle_s = 30
inter_repetition_s = 3
carrier_hz = 25000

[[phase]]
duration_min = 5
duty_pct = 50
repetitions = 2

[[phase]]
duration_min = 10
duty_pct = 95
repetitions = 1
"#;

#[test]
fn accepts_full_config() {
    let cfg = load_toml(BASE).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.phases.len(), 2);
    assert_eq!(cfg.phases[1].duty_pct, 95);
    assert!((cfg.tach.pulses_per_rev - 2.0).abs() < f64::EPSILON);
}

#[test]
fn out_of_range_tach_tuning_is_not_rejected() {
    let toml = r#"
[tach]
weighting = 5.0
min_rpm = -3.0
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("weighting/min_rpm clamp later, never reject");
}

#[rstest]
#[case("[sampling]\nsample_interval_s = 0\n", "sample_interval_s must be >= 1")]
#[case("[sampling]\ncarrier_hz = 0\n", "carrier_hz must be > 0")]
#[case("[tach]\npulses_per_rev = -1.0\n", "pulses_per_rev")]
#[case("[pins]\ntach_gpio = 19\npwm_gpio = 19\n", "must differ")]
#[case("[[phase]]\nduration_min = 0\nduty_pct = 10\n", "duration_min")]
#[case("[[phase]]\nduration_min = 60001\nduty_pct = 10\n", "duration_min")]
#[case("[[phase]]\nduration_min = 1\nduty_pct = 96\n", "duty_pct")]
#[case("[[phase]]\nduration_min = 1\nduty_pct = 10\nrepetitions = 0\n", "repetitions")]
#[case("[[phase]]\nduration_min = 1\nduty_pct = 10\nrepetitions = 1001\n", "repetitions")]
fn rejects_invalid_values(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(
        format!("{err}").contains(needle),
        "error {err} does not mention {needle}"
    );
}

#[test]
fn rejects_more_than_ten_phases() {
    let toml = "[[phase]]\nduration_min = 1\nduty_pct = 10\n".repeat(11);
    let cfg = load_toml(&toml).expect("parse TOML");
    let err = cfg.validate().expect_err("11 phases");
    assert!(format!("{err}").contains("at most 10"));
}

#[test]
fn load_file_parses_and_validates() {
    let dir = tempdir().unwrap();
    let good = dir.path().join("good.toml");
    fs::write(&good, BASE).unwrap();
    let cfg = load_file(&good).expect("load good config");
    assert_eq!(cfg.phases[0].repetitions, 2);

    let bad = dir.path().join("bad.toml");
    fs::write(&bad, "[sampling]\ncarrier_hz = 0\n").unwrap();
    assert!(load_file(&bad).is_err());

    let missing = dir.path().join("missing.toml");
    let err = load_file(&missing).expect_err("missing file");
    assert!(format!("{err}").contains("read config"));
}
