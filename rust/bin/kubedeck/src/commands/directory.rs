//! Directory commands: descriptor management, preview / import and sync.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{info, warn};

use identity::model::{DirectoryDescriptor, DirectoryState, ImportUser, OperationLog};
use identity::IdentityService;

use super::print_json;

/// Read a JSON or TOML document (picked by extension).
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let value = if is_toml {
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?
    } else {
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))?
    };
    Ok(value)
}

fn audit(svc: &IdentityService, operation: &str, detail: String) {
    let operator = svc.config().provisioner.clone();
    svc.record_operation(OperationLog::new(operator, operation, "directory", detail));
}

pub fn show(svc: &IdentityService) -> Result<()> {
    let view = match svc.directory_state()? {
        DirectoryState::NotConfigured => json!({ "state": "not_configured" }),
        DirectoryState::Disabled(d) => json!({ "state": "disabled", "directory": d.redacted() }),
        DirectoryState::Enabled(d) => json!({ "state": "enabled", "directory": d.redacted() }),
    };
    print_json(&view)
}

/// Create the descriptor from `file`, or replace the stored one.
pub async fn configure(svc: &IdentityService, file: &Path) -> Result<()> {
    let descriptor: DirectoryDescriptor = read_document(file)?;
    let saved = match svc.directory_state()?.descriptor() {
        Some(existing) => {
            let id = existing.id.clone();
            let updated = svc.update_directory(&id, descriptor).await?;
            audit(svc, "update", format!("updated directory {}", updated.url()));
            updated
        }
        None => {
            let created = svc.create_directory(descriptor).await?;
            audit(svc, "create", format!("configured directory {}", created.url()));
            created
        }
    };
    print_json(&saved.redacted())
}

pub fn delete(svc: &IdentityService) -> Result<()> {
    let descriptor = svc.get_directory()?;
    svc.delete_directory(&descriptor.id)?;
    audit(svc, "delete", format!("removed directory {}", descriptor.url()));
    println!("Directory {} removed.", descriptor.url());
    Ok(())
}

/// Search with `file`'s descriptor, or the stored one, and report the count.
pub async fn test_connect(svc: &IdentityService, file: Option<&Path>) -> Result<()> {
    let descriptor = match file {
        Some(path) => read_document(path)?,
        None => svc.get_directory()?,
    };
    let entries = svc.test_connect(&descriptor).await?;
    print_json(&json!({ "url": descriptor.url(), "entries": entries }))
}

pub async fn test_login(svc: &IdentityService, user: &str, password: &str) -> Result<()> {
    svc.test_login(user, password).await?;
    println!("Bind as {} succeeded.", user);
    Ok(())
}

pub async fn preview(svc: &IdentityService) -> Result<()> {
    let candidates = svc.preview().await?;
    print_json(&candidates)
}

/// Import the candidates in `file`, or every available previewed candidate.
pub async fn import(svc: &IdentityService, file: Option<&Path>) -> Result<()> {
    let candidates: Vec<ImportUser> = match file {
        Some(path) => read_document(path)?,
        None => svc
            .preview()
            .await?
            .into_iter()
            .filter(|c| c.available)
            .collect(),
    };
    if candidates.is_empty() {
        println!("Nothing to import.");
        return Ok(());
    }
    let result = svc.import_users(&candidates);
    audit(
        svc,
        "import",
        format!(
            "imported {} directory users, {} failed",
            result.success_count,
            result.failures.len()
        ),
    );
    print_json(&result)
}

/// Run a sync to completion. Ctrl-C cancels the background search.
pub async fn sync(svc: &Arc<IdentityService>) -> Result<()> {
    let handle = svc.sync().await?;
    let cancel = handle.cancellation_token();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling sync");
            cancel.cancel();
        }
    });

    let report = handle.wait().await;
    ctrl_c.abort();
    let report = report?;
    info!(
        found = report.found,
        inserted = report.inserted,
        cancelled = report.cancelled,
        "sync finished"
    );
    audit(
        svc,
        "sync",
        format!("found {}, inserted {}", report.found, report.inserted),
    );
    print_json(&report)
}
