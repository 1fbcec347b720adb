//! Periodic refresh of the knowledge-base and file listings.

use crate::{
    client::api_client::ApiClient,
    models::{file_info::FileInfo, knowledge_base::KnowledgeBase},
};
use anyhow::Result;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Interval between refreshes when nothing else is configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Pause after uploading before re-reading the listing, giving the
/// processing pipeline a chance to react.
pub const POST_UPLOAD_REFRESH_DELAY: Duration = Duration::from_secs(2);

/// One consistent-enough view of the server.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub knowledge_bases: Vec<KnowledgeBase>,
    pub files: Vec<FileInfo>,
}

impl Snapshot {
    /// Files belonging to `knowledge_base`.
    pub fn files_in<'a>(&'a self, knowledge_base: &'a str) -> impl Iterator<Item = &'a FileInfo> {
        self.files
            .iter()
            .filter(move |f| f.knowledge_base == knowledge_base)
    }
}

/// Polls the server on a fixed interval until its token is cancelled.
pub struct Poller {
    client: ApiClient,
    interval: Duration,
    cancel: CancellationToken,
}

impl Poller {
    pub fn new(client: ApiClient, interval: Duration, cancel: CancellationToken) -> Self {
        Self {
            client,
            interval,
            cancel,
        }
    }

    /// Fetch knowledge bases and files concurrently.
    pub async fn poll_once(&self) -> Result<Snapshot> {
        let (knowledge_bases, files) = tokio::try_join!(
            self.client.list_knowledge_bases(),
            self.client.list_files()
        )?;
        Ok(Snapshot {
            knowledge_bases,
            files,
        })
    }

    /// Poll immediately, then once per interval, handing every result to
    /// `on_poll`. Returns once the token is cancelled, including while a
    /// poll is in flight.
    pub async fn run<F>(&self, mut on_poll: F)
    where
        F: FnMut(Result<Snapshot>),
    {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("polling every {}s", self.interval.as_secs_f32());

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                result = self.poll_once() => on_poll(result),
            }
        }
        debug!("poller stopped");
    }
}
