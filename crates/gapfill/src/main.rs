//! gapfill CLI
//!
//! The main entry point for the `gapfill` binary. Report lines go to stdout,
//! diagnostics to stderr through `tracing`.

#![forbid(unsafe_code)]
// CLI uses print! macros intentionally
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

mod cli;
mod output;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use gapfill_core::config::Config;
use gapfill_core::driver::{Confirm, Prepared, RunDriver};
use gapfill_core::engine::Cancellation;
use gapfill_core::error::ExitClass;
use gapfill_core::logging::{LogConfig, init_logging};
use gapfill_core::store;
use tokio::sync::watch;

use crate::cli::Cli;
use crate::output::StdinConfirm;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref()).map_err(gapfill_core::Error::from)?;
    cli.apply_overrides(&mut config);
    config.validate().map_err(gapfill_core::Error::from)?;

    init_logging(&LogConfig::from(&config.logging)).context("Failed to initialize logging")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| gapfill_core::Error::Runtime(format!("failed to build async runtime: {e}")))?;

    let result = runtime.block_on(clean(cli, &config));
    // An interrupted prompt leaves a blocking stdin read behind.
    runtime.shutdown_background();
    result
}

/// Ctrl-C before the first write ends the run with nothing changed; during the
/// write phase it stops after the in-flight write.
async fn clean(cli: &Cli, config: &Config) -> Result<()> {
    let cancel = Cancellation::new();
    let (interrupt_tx, mut interrupted) = watch::channel(false);
    let listener = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                println!("\nInterrupted by user. Exiting gracefully...");
                cancel.cancel();
                let _ = interrupt_tx.send(true);
            }
        })
    };

    let ready = tokio::select! {
        biased;
        Ok(_) = interrupted.wait_for(|hit| *hit) => {
            print!("{}", output::render_summary(0));
            None
        }
        ready = prepare(cli, config, cancel) => ready?,
    };
    let Some((driver, prepared)) = ready else {
        listener.abort();
        return Ok(());
    };

    let joined = tokio::spawn(async move { driver.execute(prepared).await }).await;
    listener.abort();
    let report = joined
        .map_err(|e| gapfill_core::Error::Runtime(format!("run task failed: {e}")))??;

    print!("{}", output::render_failures(&report));
    print!("{}", output::render_summary(report.rows_added()));
    Ok(())
}

/// Read the log, print the estimate and confirm when needed.
///
/// `None` means the run ends here without writing (dry run or declined).
async fn prepare(
    cli: &Cli,
    config: &Config,
    cancel: Cancellation,
) -> Result<Option<(RunDriver, Prepared)>> {
    let store = store::open(&config.store).await?;
    let driver = RunDriver::from_config(store, config)
        .with_dry_run(cli.dry_run)
        .with_cancellation(cancel);

    let prepared = driver.prepare(cli.start_row).await?;
    let estimate = prepared.estimate.clone();
    let duration = driver.estimated_duration(&estimate);
    print!("{}", output::render_estimate(&estimate, duration));

    if driver.is_dry_run() {
        if let Some(latest) = prepared.snapshot().latest_timestamp() {
            println!(
                "Most recent reading: {}",
                gapfill_core::timestamp::render(latest)
            );
        }
        println!("Dry run: no changes made.");
        return Ok(None);
    }

    if driver.needs_confirmation(&estimate) && !cli.yes {
        let threshold = driver.confirm_threshold();
        let accepted = tokio::task::spawn_blocking(move || {
            StdinConfirm::new(threshold).confirm(&estimate, duration)
        })
        .await
        .map_err(|e| gapfill_core::Error::Runtime(format!("confirmation prompt failed: {e}")))?;

        if !accepted {
            println!("Aborted by user.");
            print!("{}", output::render_summary(0));
            return Ok(None);
        }
    }

    Ok(Some((driver, prepared)))
}

fn report_error(err: &anyhow::Error) {
    let core = err.downcast_ref::<gapfill_core::Error>();
    let class = core.map_or(ExitClass::Unhandled, gapfill_core::Error::exit_class);

    if gapfill_core::logging::is_logging_initialized() {
        tracing::error!(error = %format!("{err:#}"), class = ?class, "Fatal error");
    }

    match class {
        ExitClass::Configuration => eprintln!("Configuration error: {err:#}"),
        ExitClass::Connection => eprintln!("Failed to connect to the store: {err:#}"),
        ExitClass::Unhandled => eprintln!("A fatal error occurred: {err:#}"),
    }

    if let Some(remediation) = core.and_then(gapfill_core::Error::remediation) {
        eprint!("{}", remediation.render_plain());
    }
}
