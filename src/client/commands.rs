//! Entry points for the client subcommands.

use crate::{
    client::{
        api_client::{ApiClient, accepted_mime},
        poller::{POST_UPLOAD_REFRESH_DELAY, Poller, Snapshot},
        selection::SelectionStore,
        tracker::TrackedUpload,
    },
    config::ClientConfig,
};
use anyhow::Result;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Poll the server until Ctrl-C, printing the selected knowledge base's
/// files after every refresh.
pub async fn watch(cfg: ClientConfig) -> Result<()> {
    let selected = resolve_selection(&cfg).await?;
    let cancel = CancellationToken::new();
    let poller = Poller::new(ApiClient::new(&cfg.server), cfg.poll_interval, cancel.clone());

    let task = tokio::spawn(async move {
        poller
            .run(|result| match result {
                Ok(snapshot) => print_snapshot(&snapshot, &selected),
                Err(err) => warn!("refresh failed: {:#}", err),
            })
            .await;
    });

    tokio::signal::ctrl_c().await?;
    info!("stopping");
    cancel.cancel();
    task.await?;
    Ok(())
}

/// Upload `files` into the selected knowledge base, wait briefly and
/// report what the listing says about each one.
pub async fn upload(cfg: ClientConfig, files: Vec<PathBuf>) -> Result<()> {
    let selected = resolve_selection(&cfg).await?;
    let client = ApiClient::new(&cfg.server);

    let mut tracked = Vec::with_capacity(files.len());
    for path in files {
        if accepted_mime(&path).is_none() {
            warn!("{}: unsupported file type, skipped", path.display());
            tracked.push(TrackedUpload::rejected(path));
            continue;
        }
        match client.upload(&path, &selected).await {
            Ok(receipt) => {
                info!("uploaded {} as {}", path.display(), receipt.blob_name);
                tracked.push(TrackedUpload::succeeded(path, receipt));
            }
            Err(err) => {
                warn!("{}: {:#}", path.display(), err);
                tracked.push(TrackedUpload::failed(path, &err));
            }
        }
    }

    tokio::time::sleep(POST_UPLOAD_REFRESH_DELAY).await;
    match client.list_files().await {
        Ok(listed) => tracked.iter_mut().for_each(|t| t.refresh(&listed)),
        Err(err) => warn!("could not refresh file list: {:#}", err),
    }

    for upload in &tracked {
        println!(
            "{:<11} {}  {}",
            upload.status.as_str(),
            upload.path.display(),
            upload.message
        );
    }

    let failed = tracked.iter().filter(|t| t.receipt.is_none()).count();
    if failed > 0 {
        anyhow::bail!("{} of {} files were not uploaded", failed, tracked.len());
    }
    Ok(())
}

pub async fn create_knowledge_base(cfg: ClientConfig, name: &str) -> Result<()> {
    let client = ApiClient::new(&cfg.server);
    let created = client.create_knowledge_base(name).await?;
    println!("{}\t{}\t{}", created.id, created.name, created.path);

    if cfg.select {
        if let Some(store) = SelectionStore::default_location() {
            store.save(&created.id).await?;
            info!("selected knowledge base {}", created.id);
        }
    }
    Ok(())
}

/// `--knowledge-base` wins over the persisted selection; `--select` saves it.
async fn resolve_selection(cfg: &ClientConfig) -> Result<String> {
    let store = SelectionStore::default_location();
    match (&cfg.knowledge_base, store) {
        (Some(kb), Some(store)) => {
            if cfg.select {
                store.save(kb).await?;
            }
            Ok(kb.clone())
        }
        (Some(kb), None) => Ok(kb.clone()),
        (None, Some(store)) => Ok(store.load().await),
        (None, None) => Ok(crate::models::knowledge_base::DEFAULT_KNOWLEDGE_BASE.to_string()),
    }
}

fn print_snapshot(snapshot: &Snapshot, selected: &str) {
    let name = snapshot
        .knowledge_bases
        .iter()
        .find(|kb| kb.id == selected)
        .map(|kb| kb.name.as_str())
        .unwrap_or(selected);
    println!("== {} ({}) ==", name, selected);
    let mut any = false;
    for file in snapshot.files_in(selected) {
        any = true;
        println!(
            "{:<10} {:>10}  {}  {}",
            file.status.as_str(),
            file.size,
            file.upload_time.format("%Y-%m-%d %H:%M"),
            file.name
        );
    }
    if !any {
        println!("(no processed documents)");
    }
}
