use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use attestor_core::{EvaluationContext, EvaluationError, ReviewReport, RuleSet};
use attestor_runtime::{ProviderRegistry, ReviewEngine, RunUsage, RuntimeConfig};

/// Exit code for request-level errors (empty document, bad rule set or config).
const EXIT_ERROR: u8 = 2;

#[derive(Parser)]
#[command(name = "attestor", version, about = "Review compliance reports against a rule set")]
struct Cli {
    /// Log debug output to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate an extracted plain-text document
    Review {
        /// Document text file
        document: PathBuf,

        /// Rule set (JSON or YAML)
        #[arg(long)]
        rules: PathBuf,

        /// Runtime config (JSON or YAML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// User-supplied context value, repeatable
        #[arg(long = "input", value_name = "KEY=VALUE", value_parser = parse_input)]
        inputs: Vec<(String, String)>,

        /// Resolve generative rules with the keyword fallback only
        #[arg(long)]
        offline: bool,

        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Validate a rule set and list its rules
    Rules {
        file: PathBuf,
    },

    /// Check that the generative service is reachable
    Health {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    #[serde(flatten)]
    report: &'a ReviewReport,

    #[serde(skip_serializing_if = "Option::is_none")]
    usage: Option<&'a RunUsage>,
}

fn parse_input(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", raw));
    }
    Ok((key.to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli.cmd).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

async fn run(cmd: Command) -> anyhow::Result<ExitCode> {
    match cmd {
        Command::Review {
            document,
            rules,
            config,
            inputs,
            offline,
            format,
        } => {
            let rule_set = load_rule_set(&rules)?;
            let text = std::fs::read_to_string(&document)
                .with_context(|| format!("reading {}", document.display()))?;
            let inputs: BTreeMap<String, String> = inputs.into_iter().collect();

            let ctx = match EvaluationContext::new(text, inputs, Arc::new(rule_set)) {
                Ok(ctx) => ctx,
                Err(EvaluationError::EmptyDocument) => {
                    bail!("{} contains no text", document.display())
                }
                Err(e) => return Err(e.into()),
            };

            let (report, usage) = if offline {
                (attestor_core::evaluate(&ctx), None)
            } else {
                let config = RuntimeConfig::load(config.as_deref())?;
                let engine = ReviewEngine::from_config(config, &ProviderRegistry::with_defaults())?;
                let result = engine.evaluate(&ctx).await;
                (result.report, Some(result.usage))
            };

            match format {
                Format::Json => {
                    let output = JsonOutput {
                        report: &report,
                        usage: usage.as_ref(),
                    };
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                Format::Text => print_report(&report, usage.as_ref()),
            }

            Ok(if report.is_compliant() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Rules { file } => {
            let rule_set = load_rule_set(&file)?;
            println!(
                "{} {} ({} rules, {} generative)",
                rule_set.name.as_deref().unwrap_or("rule set"),
                rule_set.version.as_deref().unwrap_or(""),
                rule_set.len(),
                rule_set.generative_count()
            );
            for rule in &rule_set.rules {
                let input = rule
                    .input_key
                    .as_deref()
                    .map(|key| format!(" [input: {}]", key))
                    .unwrap_or_default();
                println!(
                    "  {:<10} {:<8} {:<16} {}{}",
                    rule.id,
                    rule.severity.as_str(),
                    rule.check_type().as_str(),
                    rule.name,
                    input
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Health { config } => {
            let config = RuntimeConfig::load(config.as_deref())?;
            let provider = config.provider.clone();
            let engine = ReviewEngine::from_config(config, &ProviderRegistry::with_defaults())?;
            if engine.health_check().await {
                println!("{}: reachable", provider);
                Ok(ExitCode::SUCCESS)
            } else {
                println!("{}: unreachable", provider);
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

fn load_rule_set(path: &std::path::Path) -> anyhow::Result<RuleSet> {
    RuleSet::from_file(path).with_context(|| format!("loading rule set {}", path.display()))
}

fn print_report(report: &ReviewReport, usage: Option<&RunUsage>) {
    for outcome in &report.results {
        let verdict = &outcome.verdict;
        let confidence = verdict
            .confidence
            .map(|c| format!(" ({:.0}%)", c * 100.0))
            .unwrap_or_default();
        println!(
            "[{:<7}] {:<10} {:<8} {:<13} {}{}",
            verdict.status.as_str().to_uppercase(),
            verdict.rule_id,
            verdict.severity.as_str(),
            outcome.method.to_string(),
            outcome.rule_name,
            confidence
        );
        println!("          {}", verdict.reason);
        for location in &verdict.locations {
            println!("          - {}", location);
        }
    }

    let summary = &report.summary;
    println!();
    println!(
        "{}  score {:.2}%  passed {}/{}  partial {}  failed {}  critical failures {}  high failures {}",
        summary.overall_status,
        summary.compliance_score,
        summary.passed_count,
        summary.total,
        summary.partial_count,
        summary.failed_count,
        summary.critical_failures,
        summary.high_failures
    );
    if let Some(usage) = usage {
        println!(
            "generative calls {}  unavailable {}  fallbacks {}  tokens {}",
            usage.generative_calls, usage.unavailable, usage.fallbacks, usage.total_tokens
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert_eq!(
            parse_input("client_name=Acme Corp").unwrap(),
            ("client_name".to_string(), "Acme Corp".to_string())
        );
        assert_eq!(parse_input("period=a=b").unwrap().1, "a=b");
        assert!(parse_input("no-separator").is_err());
        assert!(parse_input("=value").is_err());
    }

    #[test]
    fn test_cli_parses_review() {
        let cli = Cli::try_parse_from([
            "attestor",
            "review",
            "report.txt",
            "--rules",
            "rules/soc2.json",
            "--input",
            "client_name=Acme",
            "--offline",
            "--format",
            "json",
        ])
        .unwrap();

        match cli.cmd {
            Command::Review {
                inputs,
                offline,
                format,
                ..
            } => {
                assert_eq!(inputs, vec![("client_name".to_string(), "Acme".to_string())]);
                assert!(offline);
                assert!(format == Format::Json);
            }
            _ => panic!("expected review"),
        }
    }
}
