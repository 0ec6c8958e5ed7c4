//! `updraft check`: one update cycle, optionally answering file choices.

use super::common::Runtime;
use crate::constants::CONSOLE_REQUESTER;
use crate::pipeline::{JobOutcome, PendingSelection, UpdatePipeline};
use crate::scheduler::{CycleReport, Scheduler};
use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Check every source once.
#[derive(Debug, Args)]
pub struct CheckCommand {
    /// Only check this source
    #[arg(long, short)]
    pub(crate) source: Option<String>,

    /// Prompt for a choice when a release has several candidate files
    #[arg(long, short)]
    pub(crate) interactive: bool,
}

impl CheckCommand {
    /// Run one cycle and print what happened.
    ///
    /// # Errors
    ///
    /// Fails when the runtime cannot be built, the requested source does not
    /// exist, or any source failed.
    pub async fn execute(self, config_path: Option<&Path>, progress: bool) -> Result<()> {
        let runtime = Runtime::load(config_path, progress).await?;
        runtime.print_skipped();

        if let Some(name) = &self.source
            && runtime.pipeline.registry().get(name).is_none()
        {
            bail!("Source '{name}' is not configured or failed to load");
        }

        let scheduler = Scheduler::new(runtime.pipeline.clone(), runtime.config.updates.interval());
        let mut report = scheduler.run_cycle(self.source.as_deref()).await;

        if self.interactive {
            prompt_pending(&runtime.pipeline, &mut report).await?;
        }

        print_report(&report);
        if !report.failed.is_empty() {
            bail!("{} source(s) failed", report.failed.len());
        }
        Ok(())
    }
}

async fn prompt_pending(pipeline: &UpdatePipeline, report: &mut CycleReport) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(pending) = pipeline.pending().get(CONSOLE_REQUESTER) {
        print_candidates(&pending);
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let answer = line.trim();
        if answer.is_empty() {
            pipeline.pending().discard(CONSOLE_REQUESTER);
            println!("Skipped {}", pending.context.source_name());
            continue;
        }
        let Ok(index) = answer.parse::<usize>() else {
            println!("{}", "Enter a number, or nothing to skip".yellow());
            continue;
        };

        match pipeline.resolve_selection(CONSOLE_REQUESTER, index).await {
            Ok(outcome) => {
                let source = outcome.source().to_string();
                report.suspended.retain(|s| *s != source);
                match outcome {
                    JobOutcome::Installed(event) => report.installed.push(event.source),
                    JobOutcome::Cancelled { source, reason } => report.skipped.push((source, reason)),
                    JobOutcome::Suspended { source, .. } => report.suspended.push(source),
                    JobOutcome::Failed { source, error } => report.failed.push((source, error.to_string())),
                }
            }
            Err(e) => println!("{}", e.to_string().yellow()),
        }
    }
    Ok(())
}

fn print_candidates(pending: &PendingSelection) {
    println!(
        "{} {} ({}) offers several {} files:",
        "?".cyan().bold(),
        pending.context.source_name().bold(),
        pending.release_tag,
        pending.kind
    );
    for (i, asset) in pending.candidates.iter().enumerate() {
        println!("  {:>2}. {}", i + 1, asset.name);
    }
    print!("Choose a file [1-{}], or press enter to skip: ", pending.candidates.len());
    let _ = std::io::stdout().flush();
}

fn print_report(report: &CycleReport) {
    for name in &report.installed {
        println!("{} {}", "updated".green().bold(), name);
    }
    for (name, reason) in &report.skipped {
        println!("{} {} ({})", "skipped".dimmed(), name, reason);
    }
    for name in &report.suspended {
        println!("{} {} (run `updraft check -i` to choose a file)", "waiting".yellow().bold(), name);
    }
    for (name, error) in &report.failed {
        println!("{} {}: {}", "failed".red().bold(), name, error);
    }
}
