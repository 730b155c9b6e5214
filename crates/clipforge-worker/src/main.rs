//! One-shot acquisition driver.
//!
//! Usage:
//!   clipforge-worker <url> [--project <id>] [--quality <q>] [--backend <name>] [--sweep]
//!
//! Acquires the video for a project into the storage root and prints the
//! resulting status report as JSON. With `--sweep`, also runs one
//! stuck-download sweep pass before acquiring.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use clipforge_models::{ProjectId, ProjectRecord, Quality};
use clipforge_store::{MemoryProjectStore, ReferenceStore, StorageLayout};
use clipforge_worker::{
    download_status, DownloadOrchestrator, DownloadRequest, ProgressTracker, StuckSweeper,
    WorkerConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(url) = args.first().filter(|a| !a.starts_with("--")).cloned() else {
        bail!(
            "usage: clipforge-worker <url> [--project <id>] [--quality <q>] [--backend <name>] [--sweep]"
        );
    };

    let mut project_id = ProjectId(1);
    let mut quality = Quality::default();
    let config = WorkerConfig::from_env();
    let mut backend = config.backend.clone();
    let mut sweep = false;

    let mut iter = args.iter().skip(1);
    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "--project" => {
                let value = iter.next().context("--project needs a value")?;
                project_id = ProjectId(value.parse().context("--project must be an integer")?);
            }
            "--quality" => {
                let value = iter.next().context("--quality needs a value")?;
                quality = value.parse()?;
            }
            "--backend" => {
                backend = iter.next().context("--backend needs a value")?.clone();
            }
            "--sweep" => sweep = true,
            other => bail!("unknown flag: {}", other),
        }
    }

    let projects = MemoryProjectStore::shared();
    projects
        .insert(ProjectRecord::new(project_id, url.clone(), quality))
        .await;

    let layout = StorageLayout::new(&config.storage_root);
    let store = Arc::new(ReferenceStore::open(layout, projects.clone()).await?);
    let tracker = ProgressTracker::new();
    let orchestrator = Arc::new(DownloadOrchestrator::new(
        store.clone(),
        projects.clone(),
        tracker.clone(),
    ));

    if sweep {
        let sweeper = StuckSweeper::new(
            store.clone(),
            projects.clone(),
            orchestrator.clone(),
            config.stuck_threshold,
            config.sweep_interval,
        );
        let report = sweeper.sweep_once().await?;
        info!(
            scanned = report.scanned,
            stale = report.stale,
            restarted = report.restarted.len(),
            "Sweep pass done"
        );
    }

    let request = DownloadRequest::new(project_id, url)
        .with_quality(quality)
        .with_backend(backend);

    match orchestrator.ensure_video(&request).await {
        Ok(outcome) => {
            info!(source = ?outcome.source(), path = ?outcome.path(), "Acquisition finished");
        }
        Err(e) => {
            tracing::error!("Acquisition failed: {}", e);
        }
    }

    let report = download_status(&store, &tracker, project_id).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
