//! Progress event stream for one dream.
//!
//! The server answers `GET /api/dreams/{id}/events` with one JSON
//! [`DreamProgressEvent`] per line. SSE framing (`data:` prefix, `:` comments)
//! is accepted as well. Lines may be split across transport chunks.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use contracts::domain::a001_dream::DreamProgressEvent;
use futures_util::stream::{self, BoxStream, Fuse, FusedStream, Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::shared::error::ApiError;

/// Максимальная длина строки события в байтах; более длинные строки отбрасываются
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Собирает строки из произвольно нарезанных чанков
#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: Vec<u8>,
    /// `buf[..scanned]` has no newline
    scanned: usize,
    /// Пропускаем хвост слишком длинной строки до ближайшего `\n`
    discarding: bool,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Next complete line, trimmed (including a trailing `\r`).
    ///
    /// Lines longer than [`MAX_LINE_BYTES`] are logged and dropped; while one is
    /// being skipped the buffer does not grow past the limit plus one chunk.
    pub fn next_line(&mut self) -> Option<String> {
        loop {
            let Some(offset) = self.buf[self.scanned..].iter().position(|b| *b == b'\n') else {
                self.scanned = self.buf.len();
                if self.buf.len() > MAX_LINE_BYTES {
                    if !self.discarding {
                        tracing::warn!("Progress line exceeds {} bytes, dropping it", MAX_LINE_BYTES);
                    }
                    self.discarding = true;
                    self.buf.clear();
                    self.scanned = 0;
                }
                return None;
            };

            let pos = self.scanned + offset;
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            self.scanned = 0;

            if self.discarding {
                self.discarding = false;
                continue;
            }
            if raw.len() > MAX_LINE_BYTES + 1 {
                tracing::warn!("Progress line of {} bytes dropped", raw.len());
                continue;
            }
            return Some(String::from_utf8_lossy(&raw).trim().to_string());
        }
    }

    /// Конец потока: хвост без перевода строки становится последней строкой
    pub fn finish(&mut self) {
        if self.discarding {
            self.clear();
            return;
        }
        if !self.buf.is_empty() {
            self.buf.push(b'\n');
        }
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.scanned = 0;
        self.discarding = false;
    }

    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }
}

/// Decode one line.
///
/// `None` for lines that carry no event: blanks, SSE comments and SSE
/// `event:`/`id:`/`retry:` fields.
pub fn decode_line(line: &str) -> Option<Result<DreamProgressEvent, serde_json::Error>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    if ["event:", "id:", "retry:"]
        .iter()
        .any(|field| line.starts_with(field))
    {
        return None;
    }

    let payload = line.strip_prefix("data:").map(str::trim).unwrap_or(line);
    if payload.is_empty() {
        return None;
    }
    Some(serde_json::from_str(payload))
}

/// Cancellable stream of progress events.
///
/// Owns the response body: dropping the stream, or cancelling its token,
/// releases the connection. A transport error is yielded once, then the stream ends.
/// Once ended it keeps returning `None`.
pub struct ProgressStream {
    inner: Fuse<BoxStream<'static, Result<DreamProgressEvent, ApiError>>>,
    cancel: CancellationToken,
}

struct StreamState {
    body: Option<BoxStream<'static, Result<Bytes, ApiError>>>,
    decoder: LineDecoder,
    cancel: CancellationToken,
}

impl ProgressStream {
    pub fn from_response(response: reqwest::Response, cancel: CancellationToken) -> Self {
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ApiError::from));
        Self::from_bytes(body, cancel)
    }

    pub fn from_bytes<S>(body: S, cancel: CancellationToken) -> Self
    where
        S: Stream<Item = Result<Bytes, ApiError>> + Send + 'static,
    {
        let state = StreamState {
            body: Some(body.boxed()),
            decoder: LineDecoder::new(),
            cancel: cancel.clone(),
        };
        Self {
            inner: stream::unfold(state, next_event).boxed().fuse(),
            cancel,
        }
    }

    /// Stop the stream; the next poll returns `None`
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Stream for ProgressStream {
    type Item = Result<DreamProgressEvent, ApiError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl FusedStream for ProgressStream {
    fn is_terminated(&self) -> bool {
        self.inner.is_terminated()
    }
}

async fn next_event(
    mut state: StreamState,
) -> Option<(Result<DreamProgressEvent, ApiError>, StreamState)> {
    loop {
        if state.cancel.is_cancelled() {
            return None;
        }

        while let Some(line) = state.decoder.next_line() {
            match decode_line(&line) {
                Some(Ok(event)) => return Some((Ok(event), state)),
                Some(Err(e)) => {
                    let preview: String = line.chars().take(120).collect();
                    tracing::warn!("Skipping malformed progress line: {} ({})", preview, e);
                }
                None => {}
            }
        }

        let body = state.body.as_mut()?;
        tokio::select! {
            biased;
            _ = state.cancel.cancelled() => {
                tracing::debug!("Progress stream cancelled");
                return None;
            }
            chunk = body.next() => match chunk {
                Some(Ok(bytes)) => state.decoder.push(&bytes),
                Some(Err(e)) => {
                    tracing::warn!("Progress stream transport error: {}", e);
                    state.body = None;
                    state.decoder.clear();
                    return Some((Err(e), state));
                }
                None => {
                    state.body = None;
                    state.decoder.finish();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_router;
    use axum::{body::Body, routing::get, Router};
    use contracts::domain::a001_dream::DreamStatus;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn chunks(parts: &[&str]) -> Vec<Result<Bytes, ApiError>> {
        parts
            .iter()
            .map(|p| Ok(Bytes::from(p.to_string())))
            .collect()
    }

    async fn collect(parts: &[&str]) -> Vec<Result<DreamProgressEvent, ApiError>> {
        ProgressStream::from_bytes(stream::iter(chunks(parts)), CancellationToken::new())
            .collect()
            .await
    }

    #[test]
    fn test_decode_line_variants() {
        assert!(decode_line("").is_none());
        assert!(decode_line(": keep-alive").is_none());
        assert!(decode_line("event: progress").is_none());
        assert!(decode_line("data:").is_none());

        let event = decode_line(r#"data: {"status":"processing","progress":0.25}"#)
            .unwrap()
            .unwrap();
        assert_eq!(event.status, DreamStatus::Processing);
        assert_eq!(event.progress, 0.25);

        assert!(decode_line("{not json").unwrap().is_err());
    }

    #[tokio::test]
    async fn test_lines_split_across_chunks() {
        let events = collect(&[
            r#"{"status":"proc"#,
            "essing\",\"progress\":0.5}\r",
            "\n{\"status\":\"completed\",\"progress\":1.0,\"message\":\"done\"}\n",
        ])
        .await;

        assert_eq!(events.len(), 2);
        let first = events[0].as_ref().unwrap();
        assert_eq!(first.status, DreamStatus::Processing);
        assert_eq!(first.progress, 0.5);
        let second = events[1].as_ref().unwrap();
        assert_eq!(second.status, DreamStatus::Completed);
        assert_eq!(second.message.as_deref(), Some("done"));
    }

    #[tokio::test]
    async fn test_malformed_line_is_skipped() {
        let events = collect(&[
            "{\"status\":\"processing\",\"progress\":0.1}\n",
            "garbage\n",
            "{\"status\":\"banana\",\"progress\":0.2}\n",
            "\n: comment\n",
            "{\"status\":\"completed\",\"progress\":1.0}\n",
        ])
        .await;

        let statuses: Vec<_> = events
            .iter()
            .map(|e| e.as_ref().unwrap().status)
            .collect();
        assert_eq!(statuses, vec![DreamStatus::Processing, DreamStatus::Completed]);
    }

    #[tokio::test]
    async fn test_trailing_line_without_newline_is_decoded() {
        let events = collect(&["{\"status\":\"failed\",\"progress\":0.5}"]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap().status, DreamStatus::Failed);
    }

    #[test]
    fn test_oversized_line_is_dropped_and_buffer_stays_bounded() {
        let mut decoder = LineDecoder::new();
        let chunk = vec![b'x'; 16 * 1024];
        for _ in 0..20 {
            decoder.push(&chunk);
            assert!(decoder.next_line().is_none());
            assert!(decoder.buffered_len() <= MAX_LINE_BYTES + chunk.len());
        }

        decoder.push(b"end of the long line\n{\"status\":\"processing\",\"progress\":0.5}\n");
        let line = decoder.next_line().unwrap();
        assert_eq!(decode_line(&line).unwrap().unwrap().status, DreamStatus::Processing);
        assert!(decoder.next_line().is_none());
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn test_oversized_line_in_one_chunk_is_dropped() {
        let mut decoder = LineDecoder::new();
        let mut chunk = vec![b'x'; MAX_LINE_BYTES + 10];
        chunk.extend_from_slice(b"\nok\n");
        decoder.push(&chunk);

        assert_eq!(decoder.next_line().as_deref(), Some("ok"));
        assert!(decoder.next_line().is_none());
    }

    #[test]
    fn test_line_fed_byte_by_byte() {
        let mut decoder = LineDecoder::new();
        for byte in b"{\"status\":\"pending\",\"progress\":0.0}\r\n" {
            assert!(decoder.next_line().is_none());
            decoder.push(&[*byte]);
        }
        let line = decoder.next_line().unwrap();
        assert_eq!(decode_line(&line).unwrap().unwrap().status, DreamStatus::Pending);
    }

    #[tokio::test]
    async fn test_stream_skips_oversized_line() {
        let huge = "x".repeat(MAX_LINE_BYTES * 2);
        let events = collect(&[
            "{\"status\":\"processing\",\"progress\":0.1}\n",
            huge.as_str(),
            "\n{\"status\":\"completed\",\"progress\":1.0}\n",
        ])
        .await;

        let statuses: Vec<_> = events
            .iter()
            .map(|e| e.as_ref().unwrap().status)
            .collect();
        assert_eq!(statuses, vec![DreamStatus::Processing, DreamStatus::Completed]);
    }

    #[tokio::test]
    async fn test_polling_after_end_keeps_returning_none() {
        let mut events = ProgressStream::from_bytes(
            stream::iter(chunks(&["{\"status\":\"completed\",\"progress\":1.0}\n"])),
            CancellationToken::new(),
        );
        assert!(events.next().await.unwrap().is_ok());
        assert!(events.next().await.is_none());
        assert!(events.is_terminated());
        assert!(events.next().await.is_none());

        let mut cancelled = ProgressStream::from_bytes(
            stream::pending::<Result<Bytes, ApiError>>(),
            CancellationToken::new(),
        );
        cancelled.cancel();
        assert!(cancelled.next().await.is_none());
        assert!(cancelled.next().await.is_none());
    }

    #[tokio::test]
    async fn test_transport_error_is_yielded_once_then_ends() {
        let body = stream::iter(vec![
            Ok(Bytes::from("{\"status\":\"processing\",\"progress\":0.3}\n{\"sta")),
            Err(ApiError::InvalidResponse("connection reset".into())),
            Ok(Bytes::from("tus\":\"completed\",\"progress\":1.0}\n")),
        ]);
        let events: Vec<_> = ProgressStream::from_bytes(body, CancellationToken::new())
            .collect()
            .await;

        assert_eq!(events.len(), 2);
        assert!(events[0].is_ok());
        assert!(matches!(events[1], Err(ApiError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_cancel_ends_pending_stream() {
        let body = stream::iter(chunks(&["{\"status\":\"processing\",\"progress\":0.5}\n"]))
            .chain(stream::pending());
        let mut events = ProgressStream::from_bytes(body, CancellationToken::new());

        assert!(events.next().await.unwrap().is_ok());

        let token = events.cancellation_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let next = tokio::time::timeout(Duration::from_secs(2), events.next())
            .await
            .expect("cancellation must wake the stream");
        assert!(next.is_none());
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_drop_releases_body() {
        let released = Arc::new(AtomicBool::new(false));
        let guard = DropFlag(released.clone());
        let body = stream::pending::<Result<Bytes, ApiError>>().map(move |chunk| {
            let _keep = &guard;
            chunk
        });

        let mut events = ProgressStream::from_bytes(body, CancellationToken::new());
        let poll = tokio::time::timeout(Duration::from_millis(20), events.next()).await;
        assert!(poll.is_err());
        assert!(!released.load(Ordering::SeqCst));

        drop(events);
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cancel_releases_body() {
        let released = Arc::new(AtomicBool::new(false));
        let guard = DropFlag(released.clone());
        let body = stream::pending::<Result<Bytes, ApiError>>().map(move |chunk| {
            let _keep = &guard;
            chunk
        });

        let events = ProgressStream::from_bytes(body, CancellationToken::new());
        events.cancel();
        let rest: Vec<_> = events.collect().await;
        assert!(rest.is_empty());
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cancel_disconnects_from_server() {
        let released = Arc::new(AtomicBool::new(false));
        let on_request = released.clone();
        // одно событие, затем keep-alive, пока клиент не уйдёт
        let router = Router::new().route(
            "/events",
            get(move || {
                let guard = DropFlag(on_request.clone());
                async move {
                    let first = stream::iter([Ok::<_, std::io::Error>(Bytes::from_static(
                        b"{\"status\":\"processing\",\"progress\":0.5}\n",
                    ))]);
                    let pings = stream::unfold(guard, |guard| async move {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Some((Ok(Bytes::from_static(b": ping\n")), guard))
                    });
                    Body::from_stream(first.chain(pings))
                }
            }),
        );
        let base = spawn_router(router).await;

        let response = reqwest::get(format!("{}/events", base)).await.unwrap();
        let mut events = ProgressStream::from_response(response, CancellationToken::new());
        assert_eq!(events.next().await.unwrap().unwrap().status, DreamStatus::Processing);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!released.load(Ordering::SeqCst));

        events.cancel();
        assert!(events.next().await.is_none());

        let disconnected = tokio::time::timeout(Duration::from_secs(2), async {
            while !released.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(disconnected.is_ok(), "server kept the response body after cancel");
    }
}
