mod commands;
mod obs;

use clap::{Parser, Subcommand, ValueEnum};
use commands::{Command, SearchOverrides};
use std::path::PathBuf;
use strata_application::config::OptimizationMethod;

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Strategy optimization and walk-forward validation", version, arg_required_else_help = true)]
#[command(
    after_help = "Examples:\n  strata optimize --config configs/sweep.toml\n  strata optimize --config configs/sweep.toml --method bayesian --parallelism 4\n  strata validate --config configs/sweep.toml\n  strata pipeline --config configs/sweep.toml\n  strata strategies\n"
)]
struct Cli {
    /// Log filter used when STRATA_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// text | json
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    /// Expose Prometheus metrics on host:port. Falls back to STRATA_METRICS_ADDR.
    #[arg(long, global = true)]
    metrics_addr: Option<String>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Method {
    Grid,
    Random,
    Bayesian,
}

impl From<Method> for OptimizationMethod {
    fn from(method: Method) -> Self {
        match method {
            Method::Grid => OptimizationMethod::Grid,
            Method::Random => OptimizationMethod::Random,
            Method::Bayesian => OptimizationMethod::Bayesian,
        }
    }
}

#[derive(Subcommand)]
enum CliCommand {
    /// Search the parameter space and write optimization reports.
    Optimize {
        /// Config file path (TOML). If omitted, uses env STRATA_CONFIG.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Overrides `[optimization] method`.
        #[arg(long, value_enum)]
        method: Option<Method>,
        #[arg(long)]
        parallelism: Option<usize>,
    },
    /// Walk-forward validate the configured strategy parameters.
    Validate {
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Optimize, then walk-forward validate the best parameters.
    Pipeline {
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, value_enum)]
        method: Option<Method>,
        #[arg(long)]
        parallelism: Option<usize>,
    },
    /// List registered strategies and their parameter spaces.
    Strategies,
}

fn resolve_config(config: Option<PathBuf>) -> Result<PathBuf, String> {
    config
        .or_else(|| {
            std::env::var("STRATA_CONFIG")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
        })
        .ok_or_else(|| "missing --config and env STRATA_CONFIG is not set".to_string())
}

fn into_command(command: CliCommand) -> Result<Command, String> {
    Ok(match command {
        CliCommand::Optimize {
            config,
            method,
            parallelism,
        } => Command::Optimize {
            config: resolve_config(config)?,
            overrides: SearchOverrides {
                method: method.map(Into::into),
                parallelism,
            },
        },
        CliCommand::Validate { config } => Command::Validate {
            config: resolve_config(config)?,
        },
        CliCommand::Pipeline {
            config,
            method,
            parallelism,
        } => Command::Pipeline {
            config: resolve_config(config)?,
            overrides: SearchOverrides {
                method: method.map(Into::into),
                parallelism,
            },
        },
        CliCommand::Strategies => Command::Strategies,
    })
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = obs::init_tracing(&cli.log_level, &cli.log_format) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
    let metrics_addr = cli.metrics_addr.clone().or_else(|| {
        std::env::var("STRATA_METRICS_ADDR")
            .ok()
            .filter(|v| !v.trim().is_empty())
    });
    if let Err(err) = obs::init_metrics(metrics_addr.as_deref()) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }

    let result = into_command(cli.command).and_then(commands::run);
    match result {
        Ok(json) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json)
                    .unwrap_or_else(|_| "{\"status\":\"error\",\"error\":\"json\"}".to_string())
            );
        }
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn optimize_accepts_method_override() {
        let cli = Cli::try_parse_from([
            "strata",
            "optimize",
            "--config",
            "sweep.toml",
            "--method",
            "bayesian",
            "--parallelism",
            "4",
        ])
        .expect("parse");
        match into_command(cli.command).expect("command") {
            Command::Optimize { config, overrides } => {
                assert_eq!(config, PathBuf::from("sweep.toml"));
                assert_eq!(overrides.method, Some(OptimizationMethod::Bayesian));
                assert_eq!(overrides.parallelism, Some(4));
            }
            _ => panic!("expected optimize"),
        }
    }
}
