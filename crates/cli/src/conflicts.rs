//! `forcesync conflicts ...` subcommands.
//!
//! Every invocation scans first: the session only lives as long as the
//! process, so resolution always works against a fresh detection.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use dialoguer::{Confirm, Select};
use indicatif::{ProgressBar, ProgressStyle};

use forcesync_core::commands::{self, CommandOutcome, CommandRegistry};
use forcesync_core::conflict::{ConflictFile, Resolution, ResolutionReport, ResolutionStrategy};
use forcesync_core::errors::ConflictError;
use forcesync_core::{ConflictWorkflow, DetectionSummary};

use crate::style;

#[derive(Subcommand, Debug)]
pub enum ConflictsAction {
    /// Compare the local tree with the remote snapshot and list conflicts.
    Detect {
        /// Local root (defaults to the configured one).
        #[arg(long)]
        local: Option<PathBuf>,

        /// Remote snapshot root (defaults to the configured one).
        #[arg(long)]
        remote: Option<PathBuf>,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Resolve conflicts. Interactive unless --accept is given.
    Resolve {
        /// Side to keep: local or remote.
        #[arg(long)]
        accept: Option<Resolution>,

        /// Resolve only this file (relative path). Defaults to all conflicts.
        #[arg(long, requires = "accept")]
        file: Option<String>,
    },
    /// Show the diff of one conflicting file.
    Diff {
        /// Relative path of the conflicting file.
        file: String,
    },
}

pub async fn run(
    workflow: &ConflictWorkflow,
    registry: &CommandRegistry,
    action: ConflictsAction,
) -> Result<()> {
    match action {
        ConflictsAction::Detect {
            local,
            remote,
            json,
        } => {
            let summary = detect(workflow, local, remote, !json).await?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&summary).context("failed to encode result")?
                );
            } else {
                print_summary(&summary);
            }
            Ok(())
        }
        ConflictsAction::Resolve { accept, file } => {
            let summary = detect(workflow, None, None, true).await?;
            if !summary.has_conflicts() {
                println!("{}", style::success("No conflicts to resolve"));
                return Ok(());
            }
            match accept {
                Some(resolution) => resolve_direct(workflow, registry, resolution, file).await,
                None => resolve_interactive(workflow, registry).await,
            }
        }
        ConflictsAction::Diff { file } => {
            detect(workflow, None, None, true).await?;
            let entry = find_conflict(workflow, &file)?;
            registry
                .dispatch(workflow, commands::CONFLICT_DIFF, Some(&entry))
                .await?;
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// Scan with a spinner. Ctrl-C cancels the scan.
async fn detect(
    workflow: &ConflictWorkflow,
    local: Option<PathBuf>,
    remote: Option<PathBuf>,
    show_progress: bool,
) -> Result<DetectionSummary> {
    let spinner = if show_progress {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.blue} {msg}")
                .context("invalid spinner template")?
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.set_message("Scanning for conflicts...");
        spinner.enable_steady_tick(std::time::Duration::from_millis(100));
        Some(spinner)
    } else {
        None
    };

    let scan = async {
        match (local, remote) {
            (None, None) => workflow.detect_configured().await,
            (local, remote) => {
                let config_roots = workflow.roots();
                workflow
                    .detect(
                        local.unwrap_or_else(|| config_roots.0.to_path_buf()),
                        remote.unwrap_or_else(|| config_roots.1.to_path_buf()),
                    )
                    .await
            }
        }
    };
    tokio::pin!(scan);

    let result = tokio::select! {
        result = &mut scan => result,
        _ = tokio::signal::ctrl_c() => {
            workflow.cancel();
            scan.await
        }
    };

    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    match result {
        Err(ConflictError::Cancelled) => anyhow::bail!("scan cancelled"),
        other => other.context("conflict detection failed"),
    }
}

fn print_summary(summary: &DetectionSummary) {
    let diff = &summary.diff;
    println!();
    println!(
        "{}",
        style::header(&format!("Conflicts ({})", summary.conflicts.len()))
    );
    println!(
        "{}",
        style::dim(&format!(
            "local: {}  remote: {}",
            diff.local_root.display(),
            diff.remote_root.display()
        ))
    );
    println!();

    if diff.is_empty() {
        println!("{}", style::success("Local and remote trees are identical"));
        println!();
        return;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Change", "Path"]);
    for (path, kind) in diff.entries() {
        table.add_row(vec![Cell::new(style::change_kind(kind)), Cell::new(path)]);
    }
    println!("{}", table);
    println!();
    println!(
        "{} modified, {} only local, {} only remote",
        diff.modified.len(),
        diff.added.len(),
        diff.removed.len()
    );
    println!();
}

fn find_conflict(workflow: &ConflictWorkflow, file: &str) -> Result<ConflictFile> {
    let file = file.replace('\\', "/");
    workflow
        .find(&file)
        .ok_or_else(|| anyhow::anyhow!("'{}' is not a conflicting file", file))
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

async fn resolve_direct(
    workflow: &ConflictWorkflow,
    registry: &CommandRegistry,
    resolution: Resolution,
    file: Option<String>,
) -> Result<()> {
    let strategy = match file {
        Some(name) => ResolutionStrategy::ResolveOne {
            file: find_conflict(workflow, &name)?,
            resolution,
        },
        None => ResolutionStrategy::ResolveAll { resolution },
    };
    workflow.set_operation(Some(strategy));

    match registry
        .dispatch(workflow, commands::CONFLICT_PERFORM, None)
        .await?
    {
        CommandOutcome::Performed(report) => print_report(&report, resolution),
        other => anyhow::bail!("unexpected outcome: {:?}", other),
    }
}

fn print_report(report: &ResolutionReport, resolution: Resolution) -> Result<()> {
    for name in &report.resolved {
        println!(
            "{}",
            style::success(&format!("{} (kept {})", name, style::resolution(resolution)))
        );
    }
    for (name, message) in &report.failed {
        eprintln!("{}", style::error(&format!("{}: {}", name, message)));
    }
    if report.remaining > 0 {
        println!(
            "{}",
            style::warn(&format!("{} conflict(s) still unresolved", report.remaining))
        );
    }
    if !report.is_success() {
        anyhow::bail!("{} conflict(s) could not be resolved", report.failed.len());
    }
    Ok(())
}

/// Menu loop over the view: pick a file, then diff or resolve it.
async fn resolve_interactive(
    workflow: &ConflictWorkflow,
    registry: &CommandRegistry,
) -> Result<()> {
    loop {
        let (title, labels, files) = {
            let view = workflow.view();
            if view.is_empty() {
                println!("{}", style::success(view.empty_message()));
                return Ok(());
            }
            let labels: Vec<String> = view
                .nodes()
                .iter()
                .map(|n| {
                    if n.description.is_empty() {
                        n.label.clone()
                    } else {
                        format!("{}  {}", n.label, style::dim(&n.description))
                    }
                })
                .collect();
            let files: Vec<ConflictFile> = view.nodes().iter().map(|n| n.file.clone()).collect();
            (view.title(), labels, files)
        };

        let mut items = labels;
        items.push("Accept all local".into());
        items.push("Accept all remote".into());
        items.push("Quit".into());

        let default = workflow.view().selected_index().unwrap_or(0);
        let choice = Select::new()
            .with_prompt(title)
            .items(&items)
            .default(default)
            .interact()
            .context("failed to read selection")?;

        let resolution = match choice.checked_sub(files.len()) {
            None => {
                let file = &files[choice];
                workflow.view().select(choice);
                file_menu(workflow, registry, file).await?;
                continue;
            }
            Some(0) => Resolution::AcceptLocal,
            Some(1) => Resolution::AcceptRemote,
            Some(_) => {
                workflow.cancel();
                println!("{}", style::dim("Left remaining conflicts unresolved"));
                return Ok(());
            }
        };

        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Overwrite {} file(s), keeping the {} version?",
                files.len(),
                style::resolution(resolution)
            ))
            .default(false)
            .interact()
            .context("failed to read confirmation")?;
        if confirmed {
            resolve_direct(workflow, registry, resolution, None).await?;
        }
    }
}

async fn file_menu(
    workflow: &ConflictWorkflow,
    registry: &CommandRegistry,
    file: &ConflictFile,
) -> Result<()> {
    let actions = ["Show diff", "Accept remote", "Accept local", "Back"];
    loop {
        let choice = Select::new()
            .with_prompt(file.file_name.as_str())
            .items(&actions)
            .default(0)
            .interact()
            .context("failed to read action")?;

        let command = match choice {
            0 => commands::CONFLICT_DIFF,
            1 => commands::CONFLICT_ACCEPT_REMOTE,
            2 => commands::CONFLICT_ACCEPT_LOCAL,
            _ => return Ok(()),
        };

        // Failures were already shown by the workflow's notifier.
        match registry.dispatch(workflow, command, Some(file)).await {
            Ok(CommandOutcome::Resolved(outcome)) => {
                println!(
                    "{}",
                    style::success(&format!(
                        "{} resolved ({} remaining)",
                        outcome.file_name, outcome.remaining
                    ))
                );
                return Ok(());
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(error = %e, "command failed"),
        }
    }
}
