use layercache::LoggingSettings;
use layercache::observability::{
    apply_logging_level, current_filter, init_tracing, init_tracing_from_settings,
};

fn filter_is(expected: &str) -> bool {
    current_filter().is_some_and(|f| f.eq_ignore_ascii_case(expected))
}

// The subscriber is process-global, so the whole lifecycle lives in one test.
#[test]
fn tracing_installs_once_and_reloads_level() {
    unsafe {
        std::env::remove_var("RUST_LOG");
    }

    // 1) Nothing to reload before initialization
    assert!(current_filter().is_none());
    let err = apply_logging_level("warn").expect_err("not initialized yet");
    assert_eq!(err.category(), layercache::ErrorCategory::Configuration);

    // 2) Settings level is installed
    let logging = LoggingSettings {
        level: "debug".to_string(),
    };
    assert!(init_tracing_from_settings(&logging).expect("valid level"));
    assert!(filter_is("debug"), "{:?}", current_filter());

    // 3) Runtime change goes through the reload handle
    apply_logging_level("warn").expect("reload");
    assert!(filter_is("warn"), "{:?}", current_filter());

    // 4) A second install is refused and keeps the active filter
    assert!(!init_tracing().expect("valid level"));
    assert!(filter_is("warn"), "{:?}", current_filter());

    // 5) Unknown level names are rejected without touching the filter
    assert!(apply_logging_level("loud").is_err());
    assert!(filter_is("warn"), "{:?}", current_filter());
}
