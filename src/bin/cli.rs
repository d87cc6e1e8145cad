//! Tiller CLI
//!
//! Runs benchmark scenarios against the agent loop. Exit code 0 means every
//! scenario passed; non-zero means at least one failed.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use std::time::Duration;

use tiller::config::RuntimeConfig;
use tiller::harness::{builtin_scenarios, find_scenario, BenchmarkScenario, LlmMode, ScenarioRunner};
use tiller::VERSION;

#[derive(Parser)]
#[command(
    name = "tiller",
    version = VERSION,
    about = "Tiller - closed-loop runtime for LLM tool-calling agents",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scenario (by id or file path), or all built-ins
    Run {
        /// Scenario id (built-in) or path to a scenario JSON file
        #[arg(short, long)]
        scenario: Option<String>,

        /// LLM backend to drive the planner with
        #[arg(long, value_enum, default_value_t = LlmArg::Mock)]
        llm: LlmArg,

        /// Override the whole-scenario timeout (e.g. 90s, 5m)
        #[arg(long, value_parser = humantime::parse_duration)]
        timeout: Option<Duration>,
    },

    /// List the built-in scenarios
    List,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LlmArg {
    Mock,
    Real,
}

impl From<LlmArg> for LlmMode {
    fn from(arg: LlmArg) -> Self {
        match arg {
            LlmArg::Mock => LlmMode::Mock,
            LlmArg::Real => LlmMode::Real,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tiller=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            scenario,
            llm,
            timeout,
        } => run(scenario, llm.into(), timeout).await,
        Commands::List => {
            for scenario in builtin_scenarios() {
                println!("{:32} {}", scenario.id, scenario.description);
            }
            Ok(())
        }
    }
}

async fn run(selector: Option<String>, mode: LlmMode, timeout: Option<Duration>) -> anyhow::Result<()> {
    let config = RuntimeConfig::from_env();
    if mode == LlmMode::Real && !config.real_llm_available() {
        bail!("--llm real needs OPENAI_API_KEY or ANTHROPIC_API_KEY to be set");
    }

    let mut scenarios = resolve_scenarios(selector)?;
    if let Some(timeout) = timeout {
        for scenario in &mut scenarios {
            scenario.timeout = timeout;
        }
    }

    let runner = ScenarioRunner::new(mode, config);
    let mut failed = 0usize;
    for scenario in &scenarios {
        let result = runner.run(scenario).await;
        let status = if result.success { "PASS" } else { "FAIL" };
        println!(
            "[{}] {} ({} tool calls, {} turns, {:.2}s)",
            status,
            result.scenario_id,
            result.metrics.tool_calls,
            result.metrics.turns,
            result.duration.as_secs_f64()
        );
        if let Some(error) = &result.error_message {
            println!("       error: {}", error);
        }
        for outcome in result.validation_results.iter().filter(|o| !o.passed) {
            println!("       failed check {}: {}", outcome.check, outcome.detail);
        }
        if !result.success {
            failed += 1;
        }
    }

    println!("{}/{} scenarios passed", scenarios.len() - failed, scenarios.len());
    if failed > 0 {
        bail!("{} scenario(s) failed", failed);
    }
    Ok(())
}

fn resolve_scenarios(selector: Option<String>) -> anyhow::Result<Vec<BenchmarkScenario>> {
    match selector {
        None => Ok(builtin_scenarios()),
        Some(selector) => {
            if selector.ends_with(".json") || selector.contains('/') {
                let scenario = BenchmarkScenario::load(&selector)
                    .with_context(|| format!("loading scenario file '{}'", selector))?;
                Ok(vec![scenario])
            } else {
                let scenario = find_scenario(&selector)
                    .with_context(|| format!("no built-in scenario named '{}'", selector))?;
                Ok(vec![scenario])
            }
        }
    }
}
