//! Channel-backed handoff into the UI task, and the UI-side artwork
//! slot with identity-keyed cache invalidation.

use crate::artwork::ImageDescriptor;
use crate::config::UI_QUEUE_DEPTH;
use crate::ui::{UiLink, UiRequest};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};

/// The UI task's single-threaded work queue.
pub type UiQueue = Channel<CriticalSectionRawMutex, UiRequest, UI_QUEUE_DEPTH>;

/// Consumer end, drained only by the UI task.
pub type UiReceiver<'a> =
    Receiver<'a, CriticalSectionRawMutex, UiRequest, UI_QUEUE_DEPTH>;

/// Producer handle other tasks use to request UI work.
#[derive(Clone)]
pub struct UiHandoff<'a> {
    tx: Sender<'a, CriticalSectionRawMutex, UiRequest, UI_QUEUE_DEPTH>,
}

impl<'a> UiHandoff<'a> {
    pub fn new(queue: &'a UiQueue) -> Self {
        Self { tx: queue.sender() }
    }
}

impl UiLink for UiHandoff<'_> {
    async fn request(&mut self, req: UiRequest) {
        self.tx.send(req).await;
    }
}

/// The artwork image currently shown, as the UI task tracks it.
///
/// Decoded-image caches in the display library are keyed by descriptor,
/// so the slot reports which descriptor to invalidate - at most once
/// per actual change. Re-publishing the descriptor already on screen is
/// a no-op, never a double invalidation.
#[derive(Default)]
pub struct ArtworkSlot {
    current: Option<ImageDescriptor>,
}

impl ArtworkSlot {
    pub const fn new() -> Self {
        Self { current: None }
    }

    /// Descriptor on display, if any.
    pub fn current(&self) -> Option<ImageDescriptor> {
        self.current
    }

    /// Accept a published descriptor. Returns the descriptor whose
    /// cached decode must be dropped, or `None` when nothing changed.
    pub fn replace(&mut self, desc: ImageDescriptor) -> Option<ImageDescriptor> {
        if self.current == Some(desc) {
            return None;
        }
        core::mem::replace(&mut self.current, Some(desc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artwork::DownloadBuffer;

    fn descriptor_pair() -> (ImageDescriptor, ImageDescriptor) {
        let storage = std::boxed::Box::leak(std::vec![0u8; 64].into_boxed_slice());
        let mut buf = DownloadBuffer::new(storage).unwrap();
        buf.commit(16);
        let a = buf.descriptor();
        buf.clear();
        buf.commit(32);
        let b = buf.descriptor();
        (a, b)
    }

    #[test]
    fn first_publish_invalidates_nothing() {
        let (a, _) = descriptor_pair();
        let mut slot = ArtworkSlot::new();
        assert_eq!(slot.replace(a), None);
        assert_eq!(slot.current(), Some(a));
    }

    #[test]
    fn change_invalidates_the_previous_descriptor() {
        let (a, b) = descriptor_pair();
        let mut slot = ArtworkSlot::new();
        slot.replace(a);
        assert_eq!(slot.replace(b), Some(a));
        assert_eq!(slot.current(), Some(b));
    }

    #[test]
    fn republishing_the_same_descriptor_is_idempotent() {
        let (a, b) = descriptor_pair();
        let mut slot = ArtworkSlot::new();
        slot.replace(a);
        slot.replace(b);
        assert_eq!(slot.replace(b), None);
        assert_eq!(slot.replace(b), None);
        assert_eq!(slot.current(), Some(b));
    }
}
