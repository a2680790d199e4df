// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Costgate - cost-aware routing and caching in front of model backends.
//!
//! This is the binary entry point: configuration checks, dry-run routing,
//! budget reports and cache maintenance.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod analyze;
mod cache;
mod check;
mod report;
mod stores;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use costgate_config::CostgateConfig;
use costgate_core::CostgateError;

/// Costgate - cost-aware routing and caching in front of model backends.
#[derive(Parser, Debug)]
#[command(name = "costgate", version, about, long_about = None)]
struct Cli {
    /// Config file to use instead of the standard lookup locations.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate configuration and print the backend catalog.
    Check,
    /// Score a request and show where it would be routed, without calling a backend.
    Analyze {
        /// Request text.
        text: String,
        /// File whose contents are sent as the request's code context.
        #[arg(long, value_name = "PATH")]
        context_file: Option<PathBuf>,
        /// Requested backend id.
        #[arg(long)]
        backend: Option<String>,
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Show spend against the daily and monthly budgets.
    Summary {
        #[arg(long)]
        json: bool,
    },
    /// Show cost-saving recommendations from recent usage.
    Recommend {
        #[arg(long)]
        json: bool,
    },
    /// Inspect or maintain the response cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Show cache size and hit metrics.
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Evict expired and over-capacity entries now.
    Evict,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => costgate_config::load_and_validate_path(path),
        None => costgate_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            costgate_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.log.level);
    costgate_pipeline::register_metrics();

    if let Err(e) = run(cli.command, &config).await {
        eprintln!("costgate: {e}");
        std::process::exit(1);
    }
}

async fn run(command: Option<Commands>, config: &CostgateConfig) -> Result<(), CostgateError> {
    match command {
        Some(Commands::Check) => {
            check::run_check(config);
            Ok(())
        }
        Some(Commands::Analyze {
            text,
            context_file,
            backend,
            json,
        }) => {
            let context = match context_file {
                Some(path) => Some(std::fs::read_to_string(&path).map_err(|e| {
                    CostgateError::Validation(format!(
                        "cannot read context file {}: {e}",
                        path.display()
                    ))
                })?),
                None => None,
            };
            analyze::run_analyze(config, text, context, backend, json).await
        }
        Some(Commands::Summary { json }) => report::run_summary(config, json).await,
        Some(Commands::Recommend { json }) => report::run_recommend(config, json).await,
        Some(Commands::Cache { action }) => match action {
            CacheAction::Stats { json } => cache::run_stats(config, json).await,
            CacheAction::Evict => cache::run_evict(config).await,
        },
        None => {
            println!("costgate: use --help for available commands");
            Ok(())
        }
    }
}

/// Log targets that follow `[log] level`.
const WORKSPACE_TARGETS: &[&str] = &[
    "costgate",
    "costgate_cache",
    "costgate_config",
    "costgate_cost",
    "costgate_pipeline",
    "costgate_router",
    "costgate_security",
    "costgate_storage",
];

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `costgate*` crates log at `log_level`
/// and everything else at `warn`.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directives: Vec<String> = WORKSPACE_TARGETS
            .iter()
            .map(|target| format!("{target}={log_level}"))
            .collect();
        EnvFilter::new(format!("{},warn", directives.join(",")))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc supports advancing the stats epoch.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config =
            costgate_config::load_and_validate_str("").expect("default config should be valid");
        assert_eq!(config.budget.daily_budget_limit, 10.0);
        assert_eq!(config.backends.len(), 3);
    }

    #[test]
    fn parses_analyze_with_options() {
        let cli = Cli::try_parse_from([
            "costgate",
            "--config",
            "/tmp/c.toml",
            "analyze",
            "Explain GDPR",
            "--backend",
            "eu-standard",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
        match cli.command {
            Some(Commands::Analyze {
                text,
                backend,
                json,
                context_file,
            }) => {
                assert_eq!(text, "Explain GDPR");
                assert_eq!(backend.as_deref(), Some("eu-standard"));
                assert!(json);
                assert!(context_file.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_cache_subcommands() {
        let cli = Cli::try_parse_from(["costgate", "cache", "stats", "--json"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Cache {
                action: CacheAction::Stats { json: true }
            })
        ));
        let cli = Cli::try_parse_from(["costgate", "cache", "evict"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Cache {
                action: CacheAction::Evict
            })
        ));
    }

    #[test]
    fn analyze_requires_text() {
        assert!(Cli::try_parse_from(["costgate", "analyze"]).is_err());
    }

    #[tokio::test]
    async fn missing_context_file_is_a_validation_error() {
        let err = run(
            Some(Commands::Analyze {
                text: "hello".into(),
                context_file: Some(PathBuf::from("/nonexistent/costgate/ctx.rs")),
                backend: None,
                json: false,
            }),
            &CostgateConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CostgateError::Validation(_)));
    }
}
