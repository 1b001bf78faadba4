//! Contract the fetch worker expects from the HTTP collaborator.

use crate::error::FetchError;

/// One-request-at-a-time HTTP GET client.
///
/// The firmware uses an embassy-net backed implementation; tests use a
/// scripted mock. The worker drives it strictly as
/// `connect` → (`content_length`, `read`...) → `close`, never
/// overlapping requests.
#[allow(async_fn_in_trait)]
pub trait ImageSource {
    /// Open a GET request to `url` and return the HTTP status code.
    /// The implementation applies its own connect/response timeout.
    async fn connect(&mut self, url: &str) -> Result<u16, FetchError>;

    /// Declared Content-Length of the open response. `None` when the
    /// server did not declare a usable length (missing header or an
    /// unknown-length transfer encoding).
    fn content_length(&self) -> Option<usize>;

    /// Read whatever body bytes are currently available, up to
    /// `buf.len()`. Returns `Ok(0)` once the stream has ended.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, FetchError>;

    /// Tear down the open request, successful or not.
    fn close(&mut self);
}
