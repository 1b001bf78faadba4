//! UI task interface - the asynchronous handoff.
//!
//! All user-interface state is owned by a single UI task. Other tasks
//! never mutate it directly; they enqueue a [`UiRequest`] through a
//! [`UiLink`] and the UI task applies it on its own context. This is
//! the only inter-task data transfer besides the artwork queue.

pub mod handoff;

pub use handoff::{ArtworkSlot, UiHandoff, UiQueue, UiReceiver};

use crate::artwork::ImageDescriptor;
use crate::config::TEXT_MAX;
use heapless::String;

/// Track metadata for the title/artist labels.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TrackInfo {
    pub track: String<TEXT_MAX>,
    pub artist: String<TEXT_MAX>,
}

/// Work item for the UI task.
#[derive(Clone, Debug, PartialEq)]
pub enum UiRequest {
    /// Update the title/artist labels. Sent as soon as a record is
    /// dequeued, before its artwork download starts.
    TrackInfo(TrackInfo),
    /// Display a freshly validated image. Sent only after a complete,
    /// signature-checked download.
    Artwork(ImageDescriptor),
}

/// Capability to enqueue work on the UI task.
///
/// Set once at startup; the fetch worker depends on this single-method
/// abstraction rather than on any concrete UI machinery, so tests can
/// record requests instead of rendering them.
#[allow(async_fn_in_trait)]
pub trait UiLink {
    async fn request(&mut self, req: UiRequest);
}
