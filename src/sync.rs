use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::api::{OutcomeKind, Transport};
use crate::clock::{Clock, Sleeper};
use crate::error::{Error, Result};
use crate::loader::FactionLoader;

/// What happened to each faction in one sync run.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub saved: Vec<(u64, PathBuf)>,
    pub failed: Vec<(u64, String)>,
    /// The run stopped early because a wait was cancelled.
    pub interrupted: bool,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && !self.interrupted
    }
}

/// Syncs factions one at a time, pausing between them.
///
/// A failure aborts only the faction it happened in; the run moves on to the
/// next one. Cancellation stops the whole run.
pub struct FactionSync<'a, T, S> {
    loader: FactionLoader<'a, T, S>,
    clock: Arc<dyn Clock>,
    faction_delay: Duration,
    out_dir: PathBuf,
}

/// Snapshot file for a faction under `dir`.
pub fn snapshot_path(dir: &Path, faction_id: u64) -> PathBuf {
    dir.join(format!("faction-{faction_id}.json"))
}

impl<'a, T: Transport, S: Sleeper> FactionSync<'a, T, S> {
    pub fn new(
        loader: FactionLoader<'a, T, S>,
        clock: Arc<dyn Clock>,
        faction_delay: Duration,
        out_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            loader,
            clock,
            faction_delay,
            out_dir: out_dir.into(),
        }
    }

    pub async fn run(&self, factions: &[u64]) -> SyncReport {
        let mut report = SyncReport::default();

        for (i, &faction_id) in factions.iter().enumerate() {
            if i > 0
                && !self.faction_delay.is_zero()
                && self.loader.client().sleeper().sleep(self.faction_delay).await.is_err()
            {
                report.interrupted = true;
                break;
            }

            match self.sync_one(faction_id).await {
                Ok(path) => {
                    info!(faction_id, path = %path.display(), "faction synced");
                    report.saved.push((faction_id, path));
                }
                Err(Error::Api {
                    kind: OutcomeKind::Interrupted,
                    ..
                }) => {
                    report.interrupted = true;
                    break;
                }
                Err(err) => {
                    error!(faction_id, error = %err, "faction sync failed");
                    report.failed.push((faction_id, err.to_string()));
                }
            }
        }

        report
    }

    async fn sync_one(&self, faction_id: u64) -> Result<PathBuf> {
        let snapshot = self.loader.load(faction_id, self.clock.now()).await?;
        let path = snapshot_path(&self.out_dir, faction_id);
        snapshot.save(&path)?;
        Ok(path)
    }
}
