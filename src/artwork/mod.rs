//! Album-art fetch pipeline.
//!
//! The one place in the firmware that manages concurrency, partial
//! failure and resource lifetime deliberately:
//!
//! 1. **Intake** - the broker task hands each now-playing notification
//!    to [`Intake::submit`], which truncate-copies it into a bounded
//!    [`MetadataRecord`] and enqueues it without stalling the caller.
//! 2. **Queue** - a bounded FIFO channel; records are processed
//!    strictly in submission order.
//! 3. **Fetch worker** - a long-lived task that downloads each image
//!    into the single preallocated [`DownloadBuffer`] with bounded
//!    retries, validates the PNG signature, and only then publishes an
//!    [`ImageDescriptor`] to the UI task through the async handoff.
//!
//! The worker is the only writer of the download buffer, and it never
//! starts a record before finishing the previous one, so the buffer
//! needs no lock - just the one-at-a-time discipline of a single
//! consumer task.

pub mod buffer;
pub mod fetch;
pub mod intake;
pub mod record;
pub mod source;

pub use buffer::{DownloadBuffer, ImageDescriptor};
pub use fetch::FetchWorker;
pub use intake::Intake;
pub use record::MetadataRecord;
pub use source::ImageSource;

use crate::config::ARTWORK_QUEUE_DEPTH;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};

/// Bounded FIFO of pending artwork requests.
pub type ArtworkQueue =
    Channel<CriticalSectionRawMutex, MetadataRecord, ARTWORK_QUEUE_DEPTH>;

/// Producer end, held by the intake handler.
pub type ArtworkSender<'a> =
    Sender<'a, CriticalSectionRawMutex, MetadataRecord, ARTWORK_QUEUE_DEPTH>;

/// Consumer end, held by the fetch worker.
pub type ArtworkReceiver<'a> =
    Receiver<'a, CriticalSectionRawMutex, MetadataRecord, ARTWORK_QUEUE_DEPTH>;
