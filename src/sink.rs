//! The response writer the server hands to handlers.
//!
//! Handlers are synchronous and run on tokio's blocking pool; hyper wants an
//! `http::Response` with a body it can poll. The bridge is three channels:
//!
//! ```text
//! handler thread                         connection task
//! ──────────────                         ───────────────
//! write_header / first write ─ oneshot ─▶ build http::Response (status + headers)
//! write / flush              ─ mpsc    ─▶ body frames, polled by hyper
//! finish                     ─ close   ─▶ end of body
//! drop without finish        ─ oneshot ─▶ body error after the last frame
//! ```
//!
//! Body bytes are buffered and sent in chunks, or immediately on `flush`.
//! The bounded channel gives back-pressure: a slow client blocks the handler
//! thread, not the runtime. The abort signal has its own channel so it gets
//! through even when the body channel is full.

use std::io;
use std::task::{Poll, ready};

use bytes::{Bytes, BytesMut};
use futures_util::Stream;
use http::{HeaderMap, StatusCode};
use hyper::body::Frame;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::writer::{Flusher, ResponseWriter};

/// Buffered body bytes are sent once they reach this size.
pub(crate) const CHUNK_SIZE: usize = 8 * 1024;

/// Chunks in flight between a handler and its connection.
pub(crate) const CHANNEL_CAPACITY: usize = 16;

pub(crate) type Head = (StatusCode, HeaderMap);
pub(crate) type Chunk = Result<Frame<Bytes>, io::Error>;

pub(crate) struct HyperResponseWriter {
    headers: HeaderMap,
    head: Option<oneshot::Sender<Head>>,
    body: mpsc::Sender<Chunk>,
    abort: Option<oneshot::Sender<()>>,
    buf: BytesMut,
    finished: bool,
}

impl HyperResponseWriter {
    /// Creates a writer together with the receiving ends the connection task
    /// polls: the response head, and the body as a stream of frames.
    pub(crate) fn channel() -> (
        Self,
        oneshot::Receiver<Head>,
        impl Stream<Item = Chunk> + Send + Unpin + 'static,
    ) {
        let (head_tx, head_rx) = oneshot::channel();
        let (body_tx, body_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (abort_tx, abort_rx) = oneshot::channel();

        let writer = Self {
            headers: HeaderMap::new(),
            head: Some(head_tx),
            body: body_tx,
            abort: Some(abort_tx),
            buf: BytesMut::with_capacity(CHUNK_SIZE),
            finished: false,
        };

        (writer, head_rx, body_stream(body_rx, abort_rx))
    }

    /// Whether the status line and headers have been handed to hyper.
    pub(crate) fn head_sent(&self) -> bool {
        self.head.is_none()
    }

    /// Sends the head (as `200 OK` if nothing was written) and the remaining
    /// body, then ends the body.
    pub(crate) fn finish(mut self) -> io::Result<()> {
        if !self.head_sent() {
            self.write_header(StatusCode::OK);
        }
        self.finished = true;
        self.send_buffered()
    }

    fn send_buffered(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }

        let chunk = self.buf.split().freeze();
        self.body
            .blocking_send(Ok(Frame::data(chunk)))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "client went away"))
    }
}

/// Yields every queued frame, then ends the body: cleanly after `finish`, with
/// an error if the writer was dropped mid-response.
///
/// The writer signals the abort before its body sender goes away, so once the
/// body channel reports closed the abort is already visible.
fn body_stream(
    mut body: mpsc::Receiver<Chunk>,
    mut abort: oneshot::Receiver<()>,
) -> impl Stream<Item = Chunk> + Send + Unpin + 'static {
    let mut ended = false;

    futures_util::stream::poll_fn(move |cx| {
        if ended {
            return Poll::Ready(None);
        }

        match ready!(body.poll_recv(cx)) {
            Some(chunk) => Poll::Ready(Some(chunk)),
            None => {
                ended = true;
                match abort.try_recv() {
                    Ok(()) => Poll::Ready(Some(Err(io::Error::other("handler aborted the response")))),
                    Err(_) => Poll::Ready(None),
                }
            }
        }
    })
}

impl ResponseWriter for HyperResponseWriter {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: StatusCode) {
        let Some(head) = self.head.take() else {
            debug!(%status, "superfluous write_header call ignored");
            return;
        };

        // A closed receiver means the connection task is gone; the next body
        // write reports it.
        let _ = head.send((status, self.headers.clone()));
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.head_sent() {
            self.write_header(StatusCode::OK);
        }

        self.buf.extend_from_slice(buf);
        if self.buf.len() >= CHUNK_SIZE {
            self.send_buffered()?;
        }
        Ok(buf.len())
    }

    fn flusher(&mut self) -> Option<&mut dyn Flusher> {
        Some(self)
    }
}

impl Flusher for HyperResponseWriter {
    fn flush(&mut self) -> io::Result<()> {
        if !self.head_sent() {
            self.write_header(StatusCode::OK);
        }
        self.send_buffered()
    }
}

impl Drop for HyperResponseWriter {
    fn drop(&mut self) {
        // Dropped without `finish` after the head went out: the handler
        // panicked mid-response. The client must see a broken body, not a
        // truncated one that looks complete.
        if !self.finished && self.head_sent() {
            if let Some(abort) = self.abort.take() {
                let _ = abort.send(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{FutureExt, StreamExt};

    use super::*;

    fn writer() -> (
        HyperResponseWriter,
        oneshot::Receiver<Head>,
        impl Stream<Item = Chunk> + Unpin,
    ) {
        HyperResponseWriter::channel()
    }

    /// Polls the body once: `None` if nothing is ready yet.
    fn poll_next(body: &mut (impl Stream<Item = Chunk> + Unpin)) -> Option<Option<Chunk>> {
        body.next().now_or_never()
    }

    fn data(chunk: Option<Option<Chunk>>) -> Bytes {
        chunk.unwrap().unwrap().unwrap().into_data().unwrap()
    }

    fn ended(chunk: Option<Option<Chunk>>) -> bool {
        matches!(chunk, Some(None))
    }

    #[test]
    fn explicit_header_carries_headers() {
        let (mut w, mut head_rx, _body) = writer();
        w.headers_mut().insert("x-id", "7".parse().unwrap());
        w.write_header(StatusCode::CREATED);
        w.write_header(StatusCode::OK);

        let (status, headers) = head_rx.try_recv().unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(headers["x-id"], "7");
    }

    #[test]
    fn first_write_implies_ok_and_finish_sends_body() {
        let (mut w, mut head_rx, mut body) = writer();
        w.write_all(b"hello").unwrap();

        assert_eq!(head_rx.try_recv().unwrap().0, StatusCode::OK);
        assert!(poll_next(&mut body).is_none());

        w.finish().unwrap();
        assert_eq!(data(poll_next(&mut body)), Bytes::from_static(b"hello"));
        assert!(ended(poll_next(&mut body)));
    }

    #[test]
    fn flush_sends_buffered_bytes() {
        let (mut w, _head_rx, mut body) = writer();
        w.write_all(b"tick").unwrap();
        w.flush().unwrap();

        assert_eq!(data(poll_next(&mut body)), Bytes::from_static(b"tick"));
    }

    #[test]
    fn large_writes_are_chunked() {
        let (mut w, _head_rx, mut body) = writer();
        w.write_all(&vec![b'x'; CHUNK_SIZE + 1]).unwrap();

        assert_eq!(data(poll_next(&mut body)).len(), CHUNK_SIZE + 1);
    }

    #[test]
    fn write_fails_once_client_is_gone() {
        let (mut w, _head_rx, body) = writer();
        drop(body);

        let err = w.write_all(&vec![0; CHUNK_SIZE]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn drop_after_head_aborts_body() {
        let (mut w, _head_rx, mut body) = writer();
        w.write_header(StatusCode::OK);
        drop(w);

        assert!(poll_next(&mut body).unwrap().unwrap().is_err());
        assert!(ended(poll_next(&mut body)));
    }

    #[test]
    fn abort_gets_through_a_full_body_channel() {
        let (mut w, _head_rx, mut body) = writer();
        for _ in 0..CHANNEL_CAPACITY {
            w.write_all(&vec![b'x'; CHUNK_SIZE]).unwrap();
        }
        drop(w);

        let mut frames = 0;
        let mut errors = 0;
        while let Some(Some(chunk)) = poll_next(&mut body) {
            match chunk {
                Ok(_) => frames += 1,
                Err(_) => errors += 1,
            }
        }

        assert_eq!(frames, CHANNEL_CAPACITY);
        assert_eq!(errors, 1);
    }

    #[test]
    fn finished_body_ends_cleanly() {
        let (mut w, _head_rx, mut body) = writer();
        w.write_all(b"done").unwrap();
        w.finish().unwrap();

        assert_eq!(data(poll_next(&mut body)), Bytes::from_static(b"done"));
        assert!(ended(poll_next(&mut body)));
    }

    #[test]
    fn drop_before_head_sends_nothing() {
        let (w, mut head_rx, mut body) = writer();
        drop(w);

        assert!(head_rx.try_recv().is_err());
        assert!(ended(poll_next(&mut body)));
    }
}
