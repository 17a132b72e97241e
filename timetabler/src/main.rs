/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use timetabler::config::{GroupSetup, SchedulingConfigManager};
use timetabler::draft::InMemoryStore;
use timetabler::service::{GenerateRequest, GenerateResponse, TimetableService};

// ── CLI argument definition ───────────────────────────────────────────────────

/// Generate weekly class timetables from a YAML scheduling configuration.
///
/// Example:
///   timetabler -c demos/school.yaml -t 2026-fall -g cs-1a \
///              --state drafts.yaml --force
///
/// Pin a session of the current draft, then regenerate around it:
///   timetabler -c demos/school.yaml -t 2026-fall -g cs-1a \
///              --state drafts.yaml --lock cs-1a/2026-fall/v1:3 --force
#[derive(Debug, Parser)]
#[command(
    name = "timetabler",
    about = "Weekly class timetable generator",
    long_about = None,
)]
struct Cli {
    /// Path to the YAML scheduling configuration file.
    #[arg(short = 'c', long = "config")]
    config: PathBuf,

    /// Academic term to generate for.
    #[arg(short = 't', long = "term")]
    term: String,

    /// Only generate these groups (repeatable).  Default: every configured group.
    #[arg(short = 'g', long = "group")]
    groups: Vec<String>,

    /// Replace an existing draft instead of refusing.
    #[arg(short = 'f', long = "force", default_value_t = false)]
    force: bool,

    /// Do not carry locked sessions over from the previous version.
    #[arg(long = "no-preserve-locked", default_value_t = false)]
    no_preserve_locked: bool,

    /// YAML snapshot of stored timetables, loaded at start and saved at exit.
    #[arg(short = 's', long = "state")]
    state: Option<PathBuf>,

    /// Publish every freshly generated draft.
    #[arg(short = 'p', long = "publish", default_value_t = false)]
    publish: bool,

    /// Lock a session of a stored draft before generating (repeatable).
    #[arg(long = "lock", value_name = "ID:INDEX", value_parser = parse_session_ref)]
    lock: Vec<SessionRef>,

    /// Unlock a session of a stored draft before generating (repeatable).
    #[arg(long = "unlock", value_name = "ID:INDEX", value_parser = parse_session_ref)]
    unlock: Vec<SessionRef>,
}

/// `<timetable_id>:<session index>` as given to `--lock` / `--unlock`.
#[derive(Debug, Clone)]
struct SessionRef {
    timetable_id: String,
    index: usize,
}

fn parse_session_ref(s: &str) -> Result<SessionRef, String> {
    let (id, index) = s
        .rsplit_once(':')
        .ok_or_else(|| format!("expected <timetable_id>:<index>, got '{}'", s))?;
    let index = index
        .parse::<usize>()
        .map_err(|e| format!("invalid session index '{}': {}", index, e))?;
    if id.is_empty() {
        return Err("timetable id must not be empty".to_string());
    }
    Ok(SessionRef {
        timetable_id: id.to_string(),
        index,
    })
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!(
        config   = %cli.config.display(),
        term     = %cli.term,
        groups   = ?cli.groups,
        force    = cli.force,
        preserve = !cli.no_preserve_locked,
        state    = ?cli.state,
        publish  = cli.publish,
        lock     = cli.lock.len(),
        unlock   = cli.unlock.len(),
        "Configuration"
    );

    // ── Load scheduling configuration ─────────────────────────────────────────
    let mut config_manager = SchedulingConfigManager::new();
    if let Err(e) = config_manager.load_from_file(&cli.config) {
        error!("Failed to load scheduling configuration: {:#}", e);
        process::exit(1);
    }

    let selected: Vec<GroupSetup> = if cli.groups.is_empty() {
        config_manager.get_all_groups().values().cloned().collect()
    } else {
        let mut out = Vec::with_capacity(cli.groups.len());
        for id in &cli.groups {
            match config_manager.get_group(id) {
                Some(setup) => out.push(setup.clone()),
                None => {
                    error!("Group '{}' is not in the configuration", id);
                    process::exit(1);
                }
            }
        }
        out
    };

    if selected.is_empty() {
        warn!("Nothing to generate");
        return;
    }

    // ── Open the draft store ──────────────────────────────────────────────────
    let store = match &cli.state {
        Some(path) if path.exists() => match InMemoryStore::load_snapshot(path) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to load draft snapshot: {:#}", e);
                process::exit(1);
            }
        },
        _ => InMemoryStore::new(),
    };
    let store = Arc::new(store);
    let service = Arc::new(TimetableService::new(Arc::clone(&store)));

    let mut failed = false;

    // ── Apply session locks ───────────────────────────────────────────────────
    let lock_changes = cli
        .lock
        .iter()
        .map(|r| (r, true))
        .chain(cli.unlock.iter().map(|r| (r, false)));
    for (r, locked) in lock_changes {
        if let Err(e) = service.drafts().set_locked(&r.timetable_id, r.index, locked) {
            error!("Failed to change lock on {}:{}: {}", r.timetable_id, r.index, e);
            failed = true;
        }
    }

    // ── Generate every group concurrently ─────────────────────────────────────
    let handles: Vec<_> = selected
        .into_iter()
        .map(|setup| {
            let service = Arc::clone(&service);
            let request = GenerateRequest {
                group_id: setup.config.group_id.clone(),
                academic_term_id: cli.term.clone(),
                force_regenerate: cli.force,
                preserve_locked: !cli.no_preserve_locked,
            };
            let group_id = request.group_id.clone();
            let handle = tokio::task::spawn_blocking(move || {
                service.respond(
                    &request,
                    &setup.config,
                    &setup.requirements,
                    &setup.options,
                )
            });
            (group_id, handle)
        })
        .collect();

    for (group_id, handle) in handles {
        let response = match handle.await {
            Ok(r) => r,
            Err(e) => {
                error!(group = %group_id, "Generation task failed: {}", e);
                failed = true;
                continue;
            }
        };

        match &response {
            GenerateResponse::Success(ok) => {
                info!(
                    group = %group_id,
                    id = %ok.timetable_id,
                    sessions = ok.sessions_created,
                    conflicts = ok.conflicts.len(),
                    "Draft generated"
                );
                if cli.publish {
                    if let Err(e) = service.drafts().publish(&ok.timetable_id) {
                        error!(group = %group_id, "Failed to publish: {}", e);
                        failed = true;
                    }
                }
            }
            GenerateResponse::Refused(r) => info!(group = %group_id, "{}", r.error),
            GenerateResponse::Failed(_) => failed = true,
        }

        match serde_json::to_string_pretty(&response) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!(group = %group_id, "Failed to render response: {}", e);
                failed = true;
            }
        }
    }

    // ── Persist drafts ────────────────────────────────────────────────────────
    if let Some(path) = &cli.state {
        if let Err(e) = store.save_snapshot(path) {
            error!("Failed to save draft snapshot: {:#}", e);
            failed = true;
        }
    }

    if failed {
        process::exit(1);
    }
}
