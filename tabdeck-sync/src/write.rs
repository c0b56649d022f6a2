//! Handle for a queued store write.

use tabdeck_core::{StorageError, TabdeckResult};
use tokio::sync::oneshot;

/// A write queued by [`crate::StoreManager::set_data`].
///
/// Dropping it is fine: the write still happens and failures still reach
/// the notifier. Await [`PendingWrite::wait`] to observe the outcome.
#[derive(Debug)]
#[must_use = "drop the handle explicitly to fire and forget"]
pub struct PendingWrite {
    seq: u64,
    key: String,
    done: oneshot::Receiver<TabdeckResult<()>>,
}

impl PendingWrite {
    pub(crate) fn new(seq: u64, key: String, done: oneshot::Receiver<TabdeckResult<()>>) -> Self {
        Self { seq, key, done }
    }

    /// Manager-wide write sequence number. Change events produced by this
    /// write carry the same number.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Wait for the write to complete.
    pub async fn wait(self) -> TabdeckResult<()> {
        match self.done.await {
            Ok(result) => result,
            Err(_) => Err(StorageError::WriteFailed {
                key: self.key,
                reason: "writer stopped before the write completed".to_string(),
            }
            .into()),
        }
    }
}
