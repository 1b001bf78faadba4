//! Unified error types for artpanel.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Everything derives `defmt::Format` when the `defmt` feature is on so
//! failures can be logged efficiently on target.

/// Top-level error type used across the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The pending-artwork queue stayed full for the whole submit wait
    /// bound. The caller may drop or retry the notification.
    QueueFull,

    /// The artwork download buffer could not be allocated at startup.
    /// Fatal for the fetch worker; the rest of the panel keeps running.
    Allocation,
}

/// Per-attempt failure inside the fetch worker's download protocol.
///
/// Every variant is recoverable: the worker retries the attempt up to
/// its fixed bound before moving on to the next queued record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FetchError {
    /// Could not open a connection or write the request.
    Connect,

    /// The server answered, but with an unusable status or length.
    BadResponse(BadResponse),

    /// The stream ended before the declared content length arrived.
    IncompleteRead { expected: usize, got: usize },

    /// The downloaded bytes do not start with the PNG signature.
    /// Carries both sides for operator diagnostics.
    SignatureMismatch { expected: [u8; 8], actual: [u8; 8] },
}

/// Why a response was rejected before the body was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BadResponse {
    /// Non-200 HTTP status.
    Status(u16),
    /// No usable Content-Length (missing or unknown-length transfer).
    MissingLength,
    /// Content-Length of zero.
    ZeroLength,
    /// Declared length exceeds the download buffer.
    Oversized { len: usize, capacity: usize },
}

impl From<BadResponse> for FetchError {
    fn from(e: BadResponse) -> Self {
        FetchError::BadResponse(e)
    }
}
