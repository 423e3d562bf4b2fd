#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parsing, validation and plan conversion must reject bad input without panicking.
    let Ok(cfg) = fan_config::load_toml(data) else {
        return;
    };
    if cfg.validate().is_err() {
        return;
    }
    let _tach = fan_core::TachConfig::from(&cfg.tach);
    let _sampling = fan_core::SamplingCfg::from(&cfg.sampling);
    if let Ok(plan) = fan_core::TestPlan::try_from(&cfg) {
        assert!(plan.len() <= fan_config::MAX_PHASES);
        assert!(plan.iter().all(|p| p.duty_percent() <= fan_config::MAX_DUTY_PCT));
    }
});
