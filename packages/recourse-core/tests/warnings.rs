use std::cell::RefCell;
use std::rc::Rc;

use recourse::{
    configure, current_config, run, set_emitter, suppress_warnings, take_warnings, warn,
    CallingHandlers, Condition, ConditionKind, Emitted, MemoryEmitter, RuntimeConfig,
    TryCatch, WarningPolicy,
};

fn recording() -> MemoryEmitter {
    let memory = MemoryEmitter::new();
    set_emitter(memory.clone());
    memory
}

fn with_policy(policy: WarningPolicy) {
    let mut config = current_config();
    config.warning_policy = policy;
    configure(config);
}

#[test]
fn deferred_warnings_are_reported_together_at_exit() {
    let memory = recording();
    let steps = RefCell::new(Vec::new());

    let result = run(|| {
        steps.borrow_mut().push("before");
        warn("W1");
        steps.borrow_mut().push("between");
        warn("W2");
        steps.borrow_mut().push("after");
        assert!(memory.entries().is_empty(), "nothing reported mid-body");
        3
    });

    assert_eq!(result.expect("no error"), 3);
    assert_eq!(*steps.borrow(), ["before", "between", "after"]);
    assert_eq!(
        memory.take(),
        vec![Emitted::WarningBatch(vec!["W1".into(), "W2".into()])]
    );
    assert_eq!(recourse::last_warnings().len(), 2);
}

#[test]
fn deferred_warnings_flush_after_unhandled_error() {
    let memory = recording();

    let result = run(|| -> () {
        warn("first");
        recourse::raise_error("fatal");
    });

    assert!(result.is_err());
    let emitted = memory.take();
    assert_eq!(emitted.len(), 2);
    assert!(matches!(&emitted[0], Emitted::Error(report) if report.starts_with("Error: fatal")));
    assert_eq!(emitted[1], Emitted::WarningBatch(vec!["first".into()]));
}

#[test]
fn immediate_policy_reports_each_warning() {
    let memory = recording();
    with_policy(WarningPolicy::Immediate);

    run(|| {
        warn("W1");
        warn("W2");
    })
    .expect("no error");

    assert_eq!(
        memory.take(),
        vec![Emitted::Warning("W1".into()), Emitted::Warning("W2".into())]
    );
}

#[test]
fn error_policy_promotes_warning() {
    recording();
    with_policy(WarningPolicy::Error);

    let cnd = TryCatch::new()
        .on("error", |cnd| cnd)
        .run(|| {
            warn("precision lost");
            unreachable!("promoted warning must unwind");
        });

    assert_eq!(cnd.kind(), &ConditionKind::Error);
    assert_eq!(cnd.text(), "(converted from warning) precision lost");
    let parent = cnd.parent().expect("original warning kept");
    assert_eq!(parent.kind(), &ConditionKind::Warning);
}

#[test]
fn muffled_warnings_are_not_recorded() {
    let memory = recording();

    run(|| suppress_warnings(|| warn("hidden"))).expect("no error");

    assert!(memory.take().is_empty());
    assert!(take_warnings().is_empty());
}

#[test]
fn unmuffled_calling_handler_still_defers() {
    let memory = recording();
    let seen = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&seen);

    run(|| {
        CallingHandlers::new()
            .on("warning", move |_| *counter.borrow_mut() += 1)
            .run(|| warn("observed"))
    })
    .expect("no error");

    assert_eq!(*seen.borrow(), 1);
    assert_eq!(
        memory.take(),
        vec![Emitted::WarningBatch(vec!["observed".into()])]
    );
}

#[test]
fn record_pattern_collects_warnings() {
    recording();
    let recorded: Rc<RefCell<Vec<Condition>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&recorded);

    let value = CallingHandlers::new()
        .on("warning", move |cnd| {
            sink.borrow_mut().push(cnd.clone());
            recourse::muffle(cnd).expect("warn offers muffle_warning");
        })
        .run(|| {
            warn("a");
            warn("b");
            "value"
        });

    assert_eq!(value, "value");
    let texts: Vec<String> = recorded
        .borrow()
        .iter()
        .map(|c| c.text().to_string())
        .collect();
    assert_eq!(texts, ["a", "b"]);
}

#[test]
fn buffer_cap_counts_overflow() {
    let memory = recording();
    configure(RuntimeConfig {
        max_deferred_warnings: 2,
        ..RuntimeConfig::default()
    });

    run(|| {
        for idx in 0..5 {
            warn(format!("w{idx}"));
        }
        let batch = take_warnings();
        assert_eq!(batch.warnings.len(), 2);
        assert_eq!(batch.dropped, 3);
        assert!(batch.render().ends_with("There were 3 more warnings"));
    })
    .expect("no error");

    assert!(memory.take().is_empty());
}

#[test]
fn config_file_drives_policy() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("recourse.toml");
    std::fs::write(&path, "warning_policy = \"immediate\"\nreport_chain = false\n")
        .expect("write config");

    let config = RuntimeConfig::from_path(&path).expect("load config");
    assert_eq!(config.warning_policy, WarningPolicy::Immediate);
    assert!(!config.report_chain);

    std::env::set_var(recourse::config::WARN_ENV_VAR, "deferred");
    let config = config.with_env_overrides().expect("valid override");
    std::env::remove_var(recourse::config::WARN_ENV_VAR);
    assert_eq!(config.warning_policy, WarningPolicy::Deferred);
}

#[test]
fn promoted_warning_in_cleanup_reaches_outer_handler() {
    recording();
    with_policy(WarningPolicy::Error);

    let text = TryCatch::new()
        .on("error", |cnd| cnd.text().to_string())
        .run(|| {
            TryCatch::new()
                .on("io_error", |_| String::new())
                .finally(|| warn("cleanup incomplete"))
                .run(|| recourse::raise_error("body failed"))
        });

    assert_eq!(text, "(converted from warning) cleanup incomplete");
    assert_eq!(recourse::handler_depth(), 0);
}
