//! Shared artwork download buffer and the descriptor handed to the UI.

use crate::error::Error;

/// The single image download buffer.
///
/// Backed by one long-lived allocation (PSRAM on target) that is never
/// resized or freed. The fetch worker is its only writer; each attempt
/// starts with [`clear`](Self::clear) and fills it front to back with
/// [`unfilled`](Self::unfilled) + [`commit`](Self::commit), so the
/// written prefix is always `0..len`.
pub struct DownloadBuffer {
    storage: &'static mut [u8],
    len: usize,
}

impl DownloadBuffer {
    /// Wrap the startup allocation. An empty slice means the allocator
    /// collaborator failed, which is fatal for the fetch worker.
    pub fn new(storage: &'static mut [u8]) -> Result<Self, Error> {
        if storage.is_empty() {
            return Err(Error::Allocation);
        }
        Ok(Self { storage, len: 0 })
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Discard the current contents ahead of a fresh attempt.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// The writable region after the current contents. Read into this,
    /// then [`commit`](Self::commit) how many bytes actually arrived.
    pub fn unfilled(&mut self) -> &mut [u8] {
        &mut self.storage[self.len..]
    }

    /// Record `n` bytes written into [`unfilled`](Self::unfilled).
    pub fn commit(&mut self, n: usize) {
        debug_assert!(n <= self.capacity() - self.len);
        self.len = (self.len + n).min(self.capacity());
    }

    /// The written prefix.
    pub fn data(&self) -> &[u8] {
        &self.storage[..self.len]
    }

    /// Descriptor for the current contents, for the UI handoff.
    pub fn descriptor(&self) -> ImageDescriptor {
        ImageDescriptor {
            data: self.storage.as_ptr(),
            size: self.len,
        }
    }
}

/// {pointer, size} description of the most recently validated image.
///
/// Produced by the fetch worker only after a fully validated download
/// and consumed by the UI task via the async handoff. Two descriptors
/// compare equal when they describe the same bytes of the same buffer,
/// which is what the UI's cache invalidation keys on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageDescriptor {
    data: *const u8,
    size: usize,
}

// The descriptor crosses from the fetch worker to the UI task. The
// worker does not touch the buffer again until the next record's
// download begins, and the UI only reads through the descriptor it was
// handed, so the transfer is single-writer/single-reader by protocol.
unsafe impl Send for ImageDescriptor {}

impl ImageDescriptor {
    /// Raw pointer to the image bytes (what the display library wants).
    pub fn as_ptr(&self) -> *const u8 {
        self.data
    }

    /// Image size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// View the descriptor's bytes.
    ///
    /// # Safety
    ///
    /// Only valid between the handoff that delivered this descriptor
    /// and the start of the next download into the same buffer.
    pub unsafe fn bytes(&self) -> &[u8] {
        core::slice::from_raw_parts(self.data, self.size)
    }
}
