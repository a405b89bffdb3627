//! Synchronization cycle between the local state and the remote snapshot
//!
//! The policy is whole-document replacement: when a remote document
//! exists it wins over local data unconditionally, with no per-record
//! merge. Two devices syncing at the same time can therefore overwrite
//! each other; whichever downloaded last decides the outcome.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{Snapshot, SyncStatus, now};
use crate::state::AppState;
use crate::webdav::RemoteTransport;

/// Which side's dataset a cycle ended up with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncSource {
    /// No remote document existed; local data seeded it
    Local,
    /// The remote document replaced local data
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub source: SyncSource,
    pub tasks: usize,
    pub lists: usize,
    pub completed_at: DateTime<Utc>,
}

/// Drives sync cycles and tracks their status.
///
/// A cycle needs `&mut self`, so one synchronizer never runs two cycles
/// at once.
#[derive(Debug, Default)]
pub struct Synchronizer {
    status: SyncStatus,
    last_sync: Option<DateTime<Utc>>,
    observers: Vec<mpsc::UnboundedSender<SyncStatus>>,
}

impl Synchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    /// Completion time of the last successful cycle
    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.last_sync
    }

    /// Receive every status transition from now on
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SyncStatus> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.push(tx);
        rx
    }

    fn transition(&mut self, status: SyncStatus) {
        tracing::debug!(from = %self.status, to = %status, "Sync status changed");
        self.status = status;
        self.observers.retain(|tx| tx.send(status).is_ok());
    }

    /// Run one cycle.
    ///
    /// Fails with [`Error::NotConfigured`] without leaving `idle` when the
    /// transport is unconfigured. Any other failure leaves `state` and
    /// `store` exactly as they were.
    pub async fn run<R>(
        &mut self,
        remote: &R,
        store: &Database,
        state: &mut AppState,
    ) -> Result<SyncReport>
    where
        R: RemoteTransport + ?Sized,
    {
        if !remote.is_configured() {
            return Err(Error::NotConfigured);
        }

        self.transition(SyncStatus::Syncing);
        match Self::cycle(remote, store, state).await {
            Ok(report) => {
                self.last_sync = Some(report.completed_at);
                tracing::info!(
                    source = ?report.source,
                    tasks = report.tasks,
                    lists = report.lists,
                    "Sync complete"
                );
                self.transition(SyncStatus::Success);
                self.transition(SyncStatus::Idle);
                Ok(report)
            }
            Err(e) => {
                tracing::error!(error = %e, "Sync failed");
                self.transition(SyncStatus::Error);
                self.transition(SyncStatus::Idle);
                Err(e)
            }
        }
    }

    async fn cycle<R>(remote: &R, store: &Database, state: &mut AppState) -> Result<SyncReport>
    where
        R: RemoteTransport + ?Sized,
    {
        let (source, snapshot) = match remote.download().await? {
            None => {
                let local = state.snapshot();
                remote.upload(&local).await?;
                (SyncSource::Local, local)
            }
            Some(remote_snapshot) => {
                if let Some(id) = remote_snapshot.duplicate_id() {
                    return Err(Error::MalformedRemoteDocument(format!(
                        "duplicate record id {id}"
                    )));
                }
                // Re-upload refreshes the document's lastSync stamp
                remote.upload(&remote_snapshot).await?;
                (SyncSource::Remote, remote_snapshot)
            }
        };

        store.replace_snapshot(&snapshot).await?;

        let report = SyncReport {
            source,
            tasks: snapshot.tasks.len(),
            lists: snapshot.lists.len(),
            completed_at: now(),
        };
        state.replace_snapshot(snapshot);
        Ok(report)
    }
}
