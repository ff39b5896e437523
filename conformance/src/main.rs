//! Conformance scenario runner.
//!
//! Drives a subject IRC server binary through registered scenarios:
//!
//! ```bash
//! ircheck-conformance --exe ./ircd --list
//! ircheck-conformance --exe ./ircd --case connection.welcome_basic
//! ircheck-conformance --exe ./ircd --case robust.line_at_limit --format json
//! ```
//!
//! # Exit codes
//!
//! - 0: scenario passed
//! - 1: scenario failed
//! - 2: usage or internal error

use std::path::PathBuf;

use clap::Parser;
use owo_colors::OwoColorize;
use serde::Serialize;

use ircheck_conformance::{ScenarioCtx, TestResult, scenarios};
use ircheck_harness::{LogLevel, PortPolicy, SubjectConfig};

#[derive(Parser, Debug)]
#[command(name = "ircheck-conformance")]
#[command(about = "Black-box conformance scenarios for IRC server implementations")]
struct Args {
    /// Path to the subject server binary
    #[arg(long)]
    exe: Option<PathBuf>,

    /// Run a specific scenario (e.g. "connection.welcome_basic")
    #[arg(long)]
    case: Option<String>,

    /// List available scenarios
    #[arg(long)]
    list: bool,

    /// Filter by rubric category (e.g. BASIC_CONNECTION, ROBUST)
    #[arg(long)]
    category: Option<String>,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    format: String,

    /// Subject log verbosity (quiet, normal, verbose, very-verbose)
    #[arg(long, default_value = "quiet")]
    loglevel: String,

    /// Fixed listening port for the subject; a fresh random port per
    /// scenario if omitted
    #[arg(long)]
    port: Option<u16>,

    /// Attach to an already-running subject on this port instead of
    /// spawning one
    #[arg(long)]
    external_port: Option<u16>,

    /// Per-reply timeout in milliseconds
    #[arg(long, default_value_t = 100)]
    timeout_ms: u64,

    /// Let the subject inherit stdout/stderr instead of discarding them
    #[arg(long)]
    debug: bool,
}

/// JSON row for `--list --format json`.
#[derive(Serialize)]
struct ScenarioJson {
    name: &'static str,
    category: &'static str,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if args.list {
        list_scenarios(&args);
        return;
    }

    let Some(case) = args.case.clone() else {
        eprintln!("Usage: ircheck-conformance --exe <subject> --case <scenario>");
        eprintln!("       ircheck-conformance --list");
        std::process::exit(2);
    };

    let config = match subject_config(&args) {
        Ok(config) => config,
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to create runtime");

    let ctx = ScenarioCtx::new(config);
    let result = runtime.block_on(scenarios::run(&case, &ctx));
    report(&args, &result);
    std::process::exit(if result.passed { 0 } else { 1 });
}

fn subject_config(args: &Args) -> Result<SubjectConfig, String> {
    let exe = match (&args.exe, args.external_port) {
        (Some(exe), _) => exe.clone(),
        (None, Some(_)) => PathBuf::from("<external>"),
        (None, None) => return Err("either --exe or --external-port is required".to_string()),
    };

    let mut config = SubjectConfig::new(exe);
    config.port = match args.port {
        Some(port) => PortPolicy::Fixed(port),
        None => PortPolicy::Random,
    };
    config.loglevel = match args.loglevel.as_str() {
        "quiet" => LogLevel::Quiet,
        "normal" => LogLevel::Normal,
        "verbose" => LogLevel::Verbose,
        "very-verbose" => LogLevel::VeryVerbose,
        other => return Err(format!("unknown log level: {other}")),
    };
    config.msg_timeout = std::time::Duration::from_millis(args.timeout_ms);
    config.external_port = args.external_port;
    config.show_output = args.debug;
    Ok(config)
}

fn list_scenarios(args: &Args) {
    let listed = match &args.category {
        Some(category) => scenarios::list_category(category),
        None => scenarios::list_all(),
    };

    if args.format == "json" {
        let rows: Vec<ScenarioJson> = listed
            .iter()
            .map(|&(name, category)| ScenarioJson { name, category })
            .collect();
        println!(
            "{}",
            serde_json::to_string(&rows).expect("scenario list serializes")
        );
        return;
    }

    println!("Available scenarios:\n");
    let mut current_group = "";
    for (name, category) in &listed {
        let group = name.split('.').next().unwrap_or("");
        if group != current_group {
            if !current_group.is_empty() {
                println!();
            }
            println!("## {group}");
            current_group = group;
        }
        println!("  {name} [{category}]");
    }
    println!("\nTotal: {} scenarios", listed.len());
}

fn report(args: &Args, result: &TestResult) {
    if args.format == "json" {
        println!(
            "{}",
            serde_json::to_string(result).expect("result serializes")
        );
        return;
    }

    if result.passed {
        println!("{} {}", "PASS".green(), result.test);
    } else {
        println!("{} {}", "FAIL".red(), result.test);
        if let Some(error) = &result.error {
            println!("  {error}");
        }
    }
}
