//! Cargo-test bridge for the conformance scenarios.
//!
//! Scenarios need a subject server binary, which cargo cannot build for
//! us. Point `IRCHECK_EXE` at one to run the full suite:
//!
//! ```bash
//! IRCHECK_EXE=../build/ircd cargo test -p ircheck-conformance --test conformance
//! ```
//!
//! Without `IRCHECK_EXE` the bridge reports an empty trial list so plain
//! `cargo test` stays green.

use libtest_mimic::{Arguments, Failed, Trial};

use ircheck_conformance::{ScenarioCtx, scenarios};
use ircheck_harness::SubjectConfig;

fn main() {
    let args = Arguments::from_args();

    let Ok(exe) = std::env::var("IRCHECK_EXE") else {
        eprintln!("IRCHECK_EXE not set; skipping conformance scenarios");
        eprintln!("Point it at a subject server binary to run the full suite");
        libtest_mimic::run(&args, Vec::new()).exit();
    };

    let trials: Vec<Trial> = scenarios::list_all()
        .into_iter()
        .map(|(name, category)| {
            let exe = exe.clone();
            Trial::test(name, move || run_scenario(&exe, name)).with_kind(category)
        })
        .collect();

    libtest_mimic::run(&args, trials).exit();
}

fn run_scenario(exe: &str, name: &str) -> Result<(), Failed> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to create runtime: {e}"))?;

    let ctx = ScenarioCtx::new(SubjectConfig::new(exe));
    let result = runtime.block_on(scenarios::run(name, &ctx));

    if result.passed {
        Ok(())
    } else {
        Err(Failed::from(
            result.error.unwrap_or_else(|| "scenario failed".to_string()),
        ))
    }
}
