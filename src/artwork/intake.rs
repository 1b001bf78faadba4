//! Intake handler - accepts now-playing notifications from the broker
//! task and enqueues them for the fetch worker.

use crate::artwork::{ArtworkSender, MetadataRecord};
use crate::config::SUBMIT_WAIT_MS;
use crate::error::Error;
use embassy_time::{with_timeout, Duration};

/// Producer side of the artwork pipeline.
///
/// Lives on the broker task's context, which must keep servicing the
/// connection, so `submit` never waits longer than its fixed bound and
/// never allocates.
pub struct Intake<'q> {
    tx: ArtworkSender<'q>,
}

impl<'q> Intake<'q> {
    pub fn new(tx: ArtworkSender<'q>) -> Self {
        Self { tx }
    }

    /// Truncate-copy the notification into a bounded record and
    /// enqueue it.
    ///
    /// If the queue is full, waits up to [`SUBMIT_WAIT_MS`] for the
    /// worker to drain a slot, then reports [`Error::QueueFull`] so the
    /// caller can log and drop this notification instead of hanging.
    pub async fn submit(&self, url: &str, track: &str, artist: &str) -> Result<(), Error> {
        let record = MetadataRecord::new(url, track, artist);

        // Fast path: a free slot means no timer is ever armed.
        let record = match self.tx.try_send(record) {
            Ok(()) => return Ok(()),
            Err(embassy_sync::channel::TrySendError::Full(record)) => record,
        };

        match with_timeout(Duration::from_millis(SUBMIT_WAIT_MS), self.tx.send(record)).await {
            Ok(()) => Ok(()),
            Err(_) => {
                warn!("artwork queue full - dropping notification");
                Err(Error::QueueFull)
            }
        }
    }
}
