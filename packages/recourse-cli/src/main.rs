use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use recourse::{
    computed_restarts, configure, muffle, notify, raise_error, run, signal_custom, warn,
    CallingHandlers, Condition, ConditionError, RuntimeConfig, SignalOutcome, TryCatch,
    WarningPolicy,
};
use serde_json::json;

#[derive(Parser, Debug)]
#[command(author, version, about = "Drive the recourse condition runtime", long_about = None)]
struct Cli {
    /// Runtime configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the warning policy: deferred, immediate or error
    #[arg(long, global = true)]
    warn: Option<WarningPolicy>,

    /// Print results as JSON
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one of the built-in handling scenarios
    Demo {
        #[arg(value_enum)]
        scenario: Scenario,
    },

    /// Validate a runtime configuration file
    CheckConfig {
        /// Path to the TOML file
        path: PathBuf,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Scenario {
    /// An exiting handler supplies the scope's value
    Catch,
    /// A calling handler observes a condition and the body continues
    Observe,
    /// First handler in installation order wins
    TieBreak,
    /// A calling handler muffles a message
    Muffle,
    /// Muffling a condition that offers no restart fails
    InvalidRestart,
    /// Two deferred warnings reported together
    Warnings,
    /// An error nothing catches, with its causal chain
    Unhandled,
    /// A custom condition nobody listens for
    Silent,
    /// Run every scenario
    All,
}

impl Scenario {
    fn each() -> Vec<Scenario> {
        Scenario::value_variants()
            .iter()
            .copied()
            .filter(|scenario| *scenario != Scenario::All)
            .collect()
    }

    fn name(self) -> String {
        self.to_possible_value()
            .map(|value| value.get_name().to_string())
            .unwrap_or_default()
    }
}

fn load_config(path: Option<&Path>, warn: Option<WarningPolicy>) -> Result<RuntimeConfig> {
    let config = match path {
        Some(path) => RuntimeConfig::from_path(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => RuntimeConfig::default(),
    };
    let mut config = config
        .with_env_overrides()
        .context("invalid warning policy in environment")?;
    if let Some(policy) = warn {
        config.warning_policy = policy;
    }
    Ok(config)
}

fn run_scenario(scenario: Scenario) -> Result<serde_json::Value> {
    log::debug!("running scenario {}", scenario.name());
    let result = match scenario {
        Scenario::Catch => {
            let text = TryCatch::new()
                .on("error", |cnd| cnd.text().to_string())
                .run(|| raise_error("x must be numeric"));
            json!({ "returned": text })
        }
        Scenario::Observe => {
            let seen = Rc::new(RefCell::new(Vec::new()));
            let sink = Rc::clone(&seen);
            let value = CallingHandlers::new()
                .on("progress", move |cnd| sink.borrow_mut().push(cnd.text().to_string()))
                .run(|| {
                    for step in 1..=3 {
                        signal_custom("progress", ["condition"], format!("step {step}"), [("step", step)]);
                    }
                    "done"
                });
            let seen = seen.borrow().clone();
            json!({ "returned": value, "observed": seen })
        }
        Scenario::TieBreak => {
            let winner = TryCatch::new()
                .on("error", |_| "error")
                .on("bad_argument_error", |_| "bad_argument_error")
                .run(|| {
                    recourse::raise(
                        Condition::custom(["bad_argument_error", "error"], "bad argument").finish(),
                    )
                });
            json!({ "winner": winner })
        }
        Scenario::Muffle => {
            let outcome = CallingHandlers::new()
                .on("message", |_| log::info!("outer handler saw the message"))
                .run(|| {
                    CallingHandlers::new()
                        .on("message", |cnd| {
                            if let Err(err) = muffle(cnd) {
                                log::warn!("{err}");
                            }
                        })
                        .run(|| {
                            notify("hello");
                            "resumed"
                        })
                });
            json!({ "returned": outcome })
        }
        Scenario::InvalidRestart => {
            let cnd = Condition::custom(["progress"], "never signalled").finish();
            let err = match muffle(&cnd) {
                Ok(()) => anyhow::bail!("muffling an unsignalled condition succeeded"),
                Err(err) => err,
            };
            json!({ "error": err.to_string(), "restarts": computed_restarts(&cnd).len() })
        }
        Scenario::Warnings => {
            let steps = run(|| {
                let mut steps = vec!["start"];
                warn("W1");
                steps.push("between");
                warn("W2");
                steps.push("end");
                steps
            })?;
            let reported: Vec<String> = recourse::last_warnings()
                .iter()
                .map(|cnd| cnd.text().to_string())
                .collect();
            json!({ "steps": steps, "reported": reported })
        }
        Scenario::Unhandled => {
            let result = run(|| -> () {
                let cause = Condition::error("connection refused");
                recourse::rethrow("could not load dataset", cause)
            });
            match result {
                Err(ConditionError::Unhandled(cnd)) => json!({
                    "unhandled": cnd.to_record(),
                    "root_cause": cnd.root_cause().text(),
                }),
                Err(err) => return Err(err.into()),
                Ok(()) => anyhow::bail!("unhandled error was swallowed"),
            }
        }
        Scenario::Silent => {
            let outcome = signal_custom("progress", ["condition"], "nobody listens", [("pct", 50)]);
            json!({ "unhandled": outcome == SignalOutcome::Unhandled })
        }
        Scenario::All => {
            let mut all = serde_json::Map::new();
            for each in Scenario::each() {
                all.insert(each.name(), run_scenario(each)?);
            }
            serde_json::Value::Object(all)
        }
    };
    Ok(result)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default())
        .format_timestamp(None)
        .try_init()
        .ok();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.warn)?;
    configure(config);

    match cli.command {
        Commands::Demo { scenario } => {
            let result = run_scenario(scenario)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}: {result}", scenario.name());
            }
        }
        Commands::CheckConfig { path } => {
            let config = RuntimeConfig::from_path(&path)
                .with_context(|| format!("invalid config {}", path.display()))?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!(
                    "{}: ok (warning_policy = {}, max_deferred_warnings = {}, report_chain = {})",
                    path.display(),
                    config.warning_policy,
                    config.max_deferred_warnings,
                    config.report_chain
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catch_scenario_returns_handler_text() {
        let result = run_scenario(Scenario::Catch).unwrap();
        assert_eq!(result["returned"], "x must be numeric");
    }

    #[test]
    fn test_tie_break_prefers_installation_order() {
        let result = run_scenario(Scenario::TieBreak).unwrap();
        assert_eq!(result["winner"], "error");
    }

    #[test]
    fn test_observe_scenario_sees_every_step() {
        let result = run_scenario(Scenario::Observe).unwrap();
        assert_eq!(result["returned"], "done");
        assert_eq!(result["observed"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_unhandled_scenario_reports_root_cause() {
        recourse::set_emitter(recourse::MemoryEmitter::new());
        let result = run_scenario(Scenario::Unhandled).unwrap();
        assert_eq!(result["root_cause"], "connection refused");
    }

    #[test]
    fn test_cli_warn_flag_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recourse.toml");
        std::fs::write(&path, "warning_policy = \"immediate\"\n").unwrap();

        let config = load_config(Some(&path), Some(WarningPolicy::Error)).unwrap();
        assert_eq!(config.warning_policy, WarningPolicy::Error);
    }

    #[test]
    fn test_missing_config_is_reported() {
        let err = load_config(Some(Path::new("/nonexistent/recourse.toml")), None).unwrap_err();
        assert!(err.to_string().contains("failed to load config"));
    }

    #[test]
    fn test_cli_parses_demo() {
        let cli = Cli::parse_from(["recourse", "--warn", "immediate", "demo", "tie-break"]);
        assert_eq!(cli.warn, Some(WarningPolicy::Immediate));
        assert!(matches!(
            cli.command,
            Commands::Demo {
                scenario: Scenario::TieBreak
            }
        ));
    }
}
