//! Fetch worker - bounded-retry artwork download, validation and
//! publish.
//!
//! Runs forever on its own task. For each dequeued record:
//!
//! ```text
//! Idle → Connecting → Downloading → Validating → Publishing → Idle
//!            │             │             │
//!            └──── retry (bounded) ──────┘
//! ```
//!
//! Per-attempt failures (connect, bad status/length, short read, bad
//! signature) are retried up to [`MAX_DOWNLOAD_RETRIES`] with a fixed
//! pause in between. Exhausting the budget abandons that one record;
//! the previously displayed artwork stays untouched and the worker
//! moves on to the next record.

use crate::artwork::{ArtworkReceiver, DownloadBuffer, ImageSource, MetadataRecord};
use crate::config::{
    CONNECT_SETTLE_MS, MAX_DOWNLOAD_RETRIES, READ_YIELD_MS, RETRY_DELAY_MS, SERVER_SETTLE_MS,
};
use crate::error::{BadResponse, FetchError};
use crate::ui::{TrackInfo, UiLink, UiRequest};
use embedded_hal_async::delay::DelayNs;

/// Every valid PNG file starts with these eight bytes.
pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// The artwork download task.
///
/// Owns the download buffer outright; the single-consumer loop is what
/// guarantees at most one writer at a time, so no lock is needed.
pub struct FetchWorker<'q, S, D, L> {
    rx: ArtworkReceiver<'q>,
    source: S,
    delay: D,
    ui: L,
    buffer: DownloadBuffer,
}

impl<'q, S, D, L> FetchWorker<'q, S, D, L>
where
    S: ImageSource,
    D: DelayNs,
    L: UiLink,
{
    pub fn new(rx: ArtworkReceiver<'q>, source: S, delay: D, ui: L, buffer: DownloadBuffer) -> Self {
        Self {
            rx,
            source,
            delay,
            ui,
            buffer,
        }
    }

    /// Process queued records forever.
    pub async fn run(mut self) -> ! {
        info!("fetch worker started ({} byte buffer)", self.buffer.capacity());
        loop {
            self.run_once().await;
        }
    }

    /// Wait for one record and process it to completion (publish or
    /// exhausted retries). One call is one full worker cycle.
    pub async fn run_once(&mut self) {
        let record = self.rx.receive().await;
        info!("downloading artwork from {}", record.url.as_str());

        // Labels update right away; the image follows only on success.
        self.ui
            .request(UiRequest::TrackInfo(TrackInfo {
                track: record.track.clone(),
                artist: record.artist.clone(),
            }))
            .await;

        match self.download_with_retry(&record).await {
            Ok(size) => info!("artwork published, {} bytes", size),
            Err(_) => warn!(
                "failed to download artwork after {} attempts",
                MAX_DOWNLOAD_RETRIES
            ),
        }
    }

    /// Retry loop around [`attempt`](Self::attempt). Returns the
    /// published image size, or the last attempt's error once the
    /// budget is exhausted.
    async fn download_with_retry(&mut self, record: &MetadataRecord) -> Result<usize, FetchError> {
        let mut last = FetchError::Connect;

        for attempt in 1..=MAX_DOWNLOAD_RETRIES {
            if attempt > 1 {
                info!("download attempt {}/{}", attempt, MAX_DOWNLOAD_RETRIES);
            }

            match self.attempt(record.url.as_str()).await {
                Ok(size) => {
                    let descriptor = self.buffer.descriptor();
                    self.ui.request(UiRequest::Artwork(descriptor)).await;
                    return Ok(size);
                }
                Err(e) => {
                    report_attempt_failure(&e);
                    last = e;
                }
            }

            // Give the server a moment before we hit it again.
            self.delay.delay_ms(SERVER_SETTLE_MS).await;
            if attempt < MAX_DOWNLOAD_RETRIES {
                info!("waiting {} ms before retry", RETRY_DELAY_MS);
                self.delay.delay_ms(RETRY_DELAY_MS).await;
            }
        }

        Err(last)
    }

    /// One full download attempt: connect, check the response, stream
    /// the body, validate the signature. Always restarts from offset
    /// zero; partial progress is never resumed.
    async fn attempt(&mut self, url: &str) -> Result<usize, FetchError> {
        self.buffer.clear();

        // Let the link settle before connecting.
        self.delay.delay_ms(CONNECT_SETTLE_MS).await;

        let status = self.source.connect(url).await?;
        let result = self.download_open_response(status).await;
        self.source.close();
        result
    }

    async fn download_open_response(&mut self, status: u16) -> Result<usize, FetchError> {
        if status != 200 {
            return Err(BadResponse::Status(status).into());
        }

        let len = match self.source.content_length() {
            None => return Err(BadResponse::MissingLength.into()),
            Some(0) => return Err(BadResponse::ZeroLength.into()),
            Some(len) if len > self.buffer.capacity() => {
                return Err(BadResponse::Oversized {
                    len,
                    capacity: self.buffer.capacity(),
                }
                .into())
            }
            Some(len) => len,
        };

        // Chunked read: take whatever is available, yield, repeat until
        // the declared length has arrived or the stream ends short.
        while self.buffer.len() < len {
            let remaining = len - self.buffer.len();
            let chunk = self.buffer.unfilled();
            let take = remaining.min(chunk.len());
            let n = self.source.read(&mut chunk[..take]).await?;
            if n == 0 {
                return Err(FetchError::IncompleteRead {
                    expected: len,
                    got: self.buffer.len(),
                });
            }
            self.buffer.commit(n);
            self.delay.delay_ms(READ_YIELD_MS).await;
        }

        validate_signature(self.buffer.data())?;
        Ok(len)
    }
}

/// Check the PNG signature on a completed download.
fn validate_signature(data: &[u8]) -> Result<(), FetchError> {
    let mut actual = [0u8; PNG_SIGNATURE.len()];
    let head = &data[..data.len().min(PNG_SIGNATURE.len())];
    actual[..head.len()].copy_from_slice(head);

    if head.len() < PNG_SIGNATURE.len() || actual != PNG_SIGNATURE {
        return Err(FetchError::SignatureMismatch {
            expected: PNG_SIGNATURE,
            actual,
        });
    }
    Ok(())
}

fn report_attempt_failure(e: &FetchError) {
    match e {
        FetchError::Connect => warn!("unable to connect"),
        FetchError::BadResponse(BadResponse::Status(code)) => {
            warn!("HTTP request failed, status {}", code)
        }
        FetchError::BadResponse(BadResponse::MissingLength) => {
            warn!("response did not declare a content length")
        }
        FetchError::BadResponse(BadResponse::ZeroLength) => warn!("response declared zero length"),
        FetchError::BadResponse(BadResponse::Oversized { len, capacity }) => {
            warn!("image too large: {} bytes (buffer {})", len, capacity)
        }
        FetchError::IncompleteRead { expected, got } => {
            warn!("download incomplete: expected {}, got {}", expected, got)
        }
        FetchError::SignatureMismatch { expected, actual } => {
            warn!(
                "not a valid PNG: expected header {:02x}, got {:02x}",
                expected, actual
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artwork::ArtworkQueue;
    use crate::error::Error;
    use embassy_futures::block_on;
    use std::vec::Vec;

    // Scripted HTTP collaborator: one entry per expected connect call.
    struct ScriptedResponse {
        status: u16,
        content_length: Option<usize>,
        // Body served in these slices, one read call each.
        chunks: Vec<Vec<u8>>,
    }

    struct ScriptedSource {
        script: Vec<ScriptedResponse>,
        requested_urls: Vec<std::string::String>,
        next_chunk: usize,
        closes: usize,
    }

    impl ScriptedSource {
        fn new(script: Vec<ScriptedResponse>) -> Self {
            Self {
                script,
                requested_urls: Vec::new(),
                next_chunk: 0,
                closes: 0,
            }
        }

        fn current(&self) -> &ScriptedResponse {
            &self.script[self.requested_urls.len() - 1]
        }
    }

    impl ImageSource for ScriptedSource {
        async fn connect(&mut self, url: &str) -> Result<u16, FetchError> {
            assert!(
                self.requested_urls.len() < self.script.len(),
                "more connects than scripted responses"
            );
            self.requested_urls.push(url.into());
            self.next_chunk = 0;
            Ok(self.current().status)
        }

        fn content_length(&self) -> Option<usize> {
            self.current().content_length
        }

        async fn read(&mut self, buf: &mut [u8]) -> Result<usize, FetchError> {
            let chunks = &self.script[self.requested_urls.len() - 1].chunks;
            if self.next_chunk >= chunks.len() {
                return Ok(0); // end of stream
            }
            let chunk = &chunks[self.next_chunk];
            self.next_chunk += 1;
            assert!(chunk.len() <= buf.len(), "scripted chunk larger than request");
            buf[..chunk.len()].copy_from_slice(chunk);
            Ok(chunk.len())
        }

        fn close(&mut self) {
            self.closes += 1;
        }
    }

    // Delays recorded, not slept.
    #[derive(Default)]
    struct MockDelay {
        total_ms: std::cell::Cell<u64>,
    }

    impl DelayNs for &MockDelay {
        async fn delay_ns(&mut self, ns: u32) {
            self.total_ms.set(self.total_ms.get() + u64::from(ns) / 1_000_000);
        }
    }

    #[derive(Default)]
    struct RecordingLink {
        requests: Vec<UiRequest>,
    }

    impl UiLink for &mut RecordingLink {
        async fn request(&mut self, req: UiRequest) {
            self.requests.push(req);
        }
    }

    fn png_body(total: usize) -> Vec<u8> {
        let mut body = std::vec![0xABu8; total];
        body[..8].copy_from_slice(&PNG_SIGNATURE);
        body
    }

    fn split(body: &[u8], sizes: &[usize]) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        let mut at = 0;
        for &s in sizes {
            out.push(body[at..at + s].to_vec());
            at += s;
        }
        assert_eq!(at, body.len());
        out
    }

    fn leaked(capacity: usize) -> &'static mut [u8] {
        std::boxed::Box::leak(std::vec![0u8; capacity].into_boxed_slice())
    }

    struct Harness {
        queue: &'static ArtworkQueue,
        link: RecordingLink,
        delay: MockDelay,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                queue: std::boxed::Box::leak(std::boxed::Box::new(ArtworkQueue::new())),
                link: RecordingLink::default(),
                delay: MockDelay::default(),
            }
        }

        /// Submit the given records, run one worker cycle per record,
        /// and return the spent source plus the buffer base pointer.
        fn drive(
            &mut self,
            records: &[(&str, &str, &str)],
            source: ScriptedSource,
            capacity: usize,
        ) -> (ScriptedSource, *const u8) {
            let storage = leaked(capacity);
            let base = storage.as_ptr();
            let buffer = DownloadBuffer::new(storage).unwrap();
            let mut worker =
                FetchWorker::new(self.queue.receiver(), source, &self.delay, &mut self.link, buffer);

            block_on(async {
                for &(url, track, artist) in records {
                    self.queue
                        .sender()
                        .send(MetadataRecord::new(url, track, artist))
                        .await;
                }
                for _ in records {
                    worker.run_once().await;
                }
            });

            (worker.source, base)
        }
    }

    fn artwork_publishes(requests: &[UiRequest]) -> Vec<crate::artwork::ImageDescriptor> {
        requests
            .iter()
            .filter_map(|r| match r {
                UiRequest::Artwork(d) => Some(*d),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn happy_path_publishes_once_with_exact_size() {
        // 1024-byte PNG served in three partial reads of 400/400/224.
        let body = png_body(1024);
        let source = ScriptedSource::new(std::vec![ScriptedResponse {
            status: 200,
            content_length: Some(1024),
            chunks: split(&body, &[400, 400, 224]),
        }]);

        let mut h = Harness::new();
        let (source, base) = h.drive(&[("https://x/img.png", "T", "A")], source, 2048);

        let published = artwork_publishes(&h.link.requests);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].as_ptr(), base);
        assert_eq!(published[0].size(), 1024);
        assert_eq!(source.requested_urls, ["https://x/img.png"]);
        assert_eq!(source.closes, 1);

        // Track info goes out before the artwork.
        match &h.link.requests[0] {
            UiRequest::TrackInfo(info) => {
                assert_eq!(info.track.as_str(), "T");
                assert_eq!(info.artist.as_str(), "A");
            }
            other => panic!("expected track info first, got {other:?}"),
        }
    }

    #[test]
    fn http_404_three_times_means_no_publish() {
        let failing = || ScriptedResponse {
            status: 404,
            content_length: None,
            chunks: Vec::new(),
        };
        let source = ScriptedSource::new(std::vec![failing(), failing(), failing()]);

        let mut h = Harness::new();
        let (source, _) = h.drive(&[("https://x/gone.png", "T", "A")], source, 2048);

        assert!(artwork_publishes(&h.link.requests).is_empty());
        assert_eq!(source.requested_urls.len(), 3); // one per retry
        assert_eq!(source.closes, 3);
    }

    #[test]
    fn oversized_length_never_enters_the_read_loop() {
        let response = |len| ScriptedResponse {
            status: 200,
            content_length: Some(len),
            chunks: Vec::new(),
        };
        let source = ScriptedSource::new(std::vec![response(4096), response(4096), response(4096)]);

        let mut h = Harness::new();
        let (source, _) = h.drive(&[("https://x/huge.png", "T", "A")], source, 2048);

        assert!(artwork_publishes(&h.link.requests).is_empty());
        // No read calls were consumed: chunks stayed untouched.
        assert_eq!(source.next_chunk, 0);
    }

    #[test]
    fn zero_and_missing_length_fail_before_reading() {
        let source = ScriptedSource::new(std::vec![
            ScriptedResponse {
                status: 200,
                content_length: Some(0),
                chunks: Vec::new(),
            },
            ScriptedResponse {
                status: 200,
                content_length: None,
                chunks: Vec::new(),
            },
            ScriptedResponse {
                status: 200,
                content_length: Some(0),
                chunks: Vec::new(),
            },
        ]);

        let mut h = Harness::new();
        let (source, _) = h.drive(&[("https://x/empty.png", "T", "A")], source, 2048);

        assert!(artwork_publishes(&h.link.requests).is_empty());
        assert_eq!(source.requested_urls.len(), 3);
    }

    #[test]
    fn bad_signature_is_rejected_and_retried() {
        let mut body = png_body(64);
        body[0] = 0xFF; // corrupt the magic
        let bad = || ScriptedResponse {
            status: 200,
            content_length: Some(64),
            chunks: std::vec![body.clone()],
        };
        let source = ScriptedSource::new(std::vec![bad(), bad(), bad()]);

        let mut h = Harness::new();
        let (source, _) = h.drive(&[("https://x/notpng.png", "T", "A")], source, 2048);

        assert!(artwork_publishes(&h.link.requests).is_empty());
        assert_eq!(source.requested_urls.len(), 3);
    }

    #[test]
    fn short_stream_is_an_incomplete_read() {
        // Server claims 512 bytes but the stream ends after 100.
        let short = || ScriptedResponse {
            status: 200,
            content_length: Some(512),
            chunks: std::vec![png_body(100)],
        };
        let source = ScriptedSource::new(std::vec![short(), short(), short()]);

        let mut h = Harness::new();
        let (_, _) = h.drive(&[("https://x/cut.png", "T", "A")], source, 2048);

        assert!(artwork_publishes(&h.link.requests).is_empty());
    }

    #[test]
    fn worker_moves_on_after_exhausting_one_record() {
        let failing = || ScriptedResponse {
            status: 500,
            content_length: None,
            chunks: Vec::new(),
        };
        let body = png_body(256);
        let good = ScriptedResponse {
            status: 200,
            content_length: Some(256),
            chunks: split(&body, &[256]),
        };
        let source =
            ScriptedSource::new(std::vec![failing(), failing(), failing(), good]);

        let mut h = Harness::new();
        let (source, base) = h.drive(
            &[
                ("https://x/bad.png", "bad", "a"),
                ("https://x/good.png", "good", "b"),
            ],
            source,
            2048,
        );

        // First record burned all three attempts, second succeeded.
        assert_eq!(source.requested_urls.len(), 4);
        assert_eq!(source.requested_urls[3], "https://x/good.png");
        let published = artwork_publishes(&h.link.requests);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].as_ptr(), base);
        assert_eq!(published[0].size(), 256);
    }

    #[test]
    fn each_attempt_restarts_from_offset_zero() {
        // Attempt 1 delivers a short stream; attempt 2 the full body.
        // If offset were resumed the final image would be corrupt.
        let body = png_body(300);
        let source = ScriptedSource::new(std::vec![
            ScriptedResponse {
                status: 200,
                content_length: Some(300),
                chunks: std::vec![body[..120].to_vec()],
            },
            ScriptedResponse {
                status: 200,
                content_length: Some(300),
                chunks: split(&body, &[120, 180]),
            },
        ]);

        let mut h = Harness::new();
        let (_, _) = h.drive(&[("https://x/retry.png", "T", "A")], source, 2048);

        let published = artwork_publishes(&h.link.requests);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].size(), 300);
        // The published buffer holds the intact PNG, not a spliced one.
        let bytes = unsafe { published[0].bytes() };
        assert_eq!(bytes, &body[..]);
    }

    #[test]
    fn retry_pacing_uses_the_named_delays() {
        let failing = || ScriptedResponse {
            status: 404,
            content_length: None,
            chunks: Vec::new(),
        };
        let source = ScriptedSource::new(std::vec![failing(), failing(), failing()]);

        let mut h = Harness::new();
        let _ = h.drive(&[("https://x/gone.png", "T", "A")], source, 2048);

        // 3 settles + 3 server graces + 2 inter-attempt pauses.
        let expected = 3 * u64::from(CONNECT_SETTLE_MS)
            + 3 * u64::from(SERVER_SETTLE_MS)
            + 2 * u64::from(RETRY_DELAY_MS);
        assert_eq!(h.delay.total_ms.get(), expected);
    }

    #[test]
    fn empty_buffer_refuses_to_start() {
        let storage: &'static mut [u8] = std::boxed::Box::leak(std::boxed::Box::new([]));
        assert_eq!(DownloadBuffer::new(storage).err(), Some(Error::Allocation));
    }

    #[test]
    fn signature_check_reports_both_sides() {
        let err = validate_signature(&[0x89, 0x50, 0x4E, 0x47, 0x00, 0x00, 0x00, 0x00]);
        match err {
            Err(FetchError::SignatureMismatch { expected, actual }) => {
                assert_eq!(expected, PNG_SIGNATURE);
                assert_eq!(&actual[..4], &PNG_SIGNATURE[..4]);
                assert_eq!(actual[4], 0x00);
            }
            other => panic!("expected signature mismatch, got {other:?}"),
        }
    }

    #[test]
    fn bodies_shorter_than_the_signature_mismatch() {
        let err = validate_signature(&PNG_SIGNATURE[..5]);
        assert!(matches!(err, Err(FetchError::SignatureMismatch { .. })));
    }
}
