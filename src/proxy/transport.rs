//! Traced HTTP/1 transport to a single backend.
//!
//! [`send`] opens a fresh connection to the chosen backend, performs the
//! HTTP/1 handshake, sends one request, and returns once the response
//! head has arrived. The body is streamed to the caller, never buffered.
//! The socket is wrapped in [`TracedStream`], which fires the
//! [`ClientTrace`] hooks as bytes move: a flush after writes means the
//! request is on the wire, and the first non-empty read is the first
//! response byte. [`TracedBody`] reports when the body has been fully
//! relayed.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::http::{HeaderMap, Method, StatusCode};
use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;

use crate::config::model::HostPort;

use super::trace::ClientTrace;

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("connect to {backend} failed: {source}")]
    Connect {
        backend: String,
        #[source]
        source: io::Error,
    },

    #[error("handshake failed: {0}")]
    Handshake(#[source] hyper::Error),

    #[error("invalid outbound request: {0}")]
    Build(#[from] axum::http::Error),

    #[error("request failed: {0}")]
    Request(#[source] hyper::Error),

    #[error("backend did not respond within {0:?}")]
    Timeout(Duration),
}

impl ForwardError {
    /// Status returned to the caller when no backend response exists to relay.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

pub struct BackendRequest<'a> {
    pub backend: &'a HostPort,
    pub method: Method,
    /// Origin-form target, `path[?query]`.
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub timeout: Duration,
}

#[derive(Debug)]
pub struct BackendResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Incoming,
}

/// Socket wrapper that reports write completion and the first read.
pub struct TracedStream<S> {
    inner: S,
    trace: Arc<dyn ClientTrace>,
    unflushed: bool,
    read_any: bool,
}

impl<S> TracedStream<S> {
    pub fn new(inner: S, trace: Arc<dyn ClientTrace>) -> Self {
        Self {
            inner,
            trace,
            unflushed: false,
            read_any: false,
        }
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for TracedStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let poll = Pin::new(&mut this.inner).poll_read(cx, buf);
        if matches!(poll, Poll::Ready(Ok(()))) && !this.read_any && buf.filled().len() > before {
            this.read_any = true;
            this.trace.got_first_response_byte();
        }
        poll
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for TracedStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_write(cx, buf);
        if matches!(poll, Poll::Ready(Ok(n)) if n > 0) {
            this.unflushed = true;
        }
        poll
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_write_vectored(cx, bufs);
        if matches!(poll, Poll::Ready(Ok(n)) if n > 0) {
            this.unflushed = true;
        }
        poll
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_flush(cx);
        // Large bodies flush more than once; the last flush wins.
        if matches!(poll, Poll::Ready(Ok(()))) && this.unflushed {
            this.unflushed = false;
            this.trace.wrote_request();
        }
        poll
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

/// Response body wrapper that runs `on_done` once, when the stream ends,
/// fails, or is dropped early by the caller.
pub struct TracedBody<B> {
    inner: B,
    on_done: Option<Box<dyn FnOnce() + Send>>,
}

impl<B> TracedBody<B> {
    pub fn new(inner: B, on_done: impl FnOnce() + Send + 'static) -> Self {
        Self {
            inner,
            on_done: Some(Box::new(on_done)),
        }
    }

    fn finish(&mut self) {
        if let Some(on_done) = self.on_done.take() {
            on_done();
        }
    }
}

impl<B: Body + Unpin> Body for TracedBody<B> {
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_frame(cx);
        if matches!(poll, Poll::Ready(None | Some(Err(_)))) {
            this.finish();
        }
        poll
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl<B> Drop for TracedBody<B> {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Send one request to the backend. `req.timeout` bounds everything up
/// to the response head; the body streams without a deadline.
pub async fn send(
    req: BackendRequest<'_>,
    trace: Arc<dyn ClientTrace>,
) -> Result<BackendResponse, ForwardError> {
    let timeout = req.timeout;
    tokio::time::timeout(timeout, exchange(req, trace))
        .await
        .map_err(|_| ForwardError::Timeout(timeout))?
}

async fn exchange(
    req: BackendRequest<'_>,
    trace: Arc<dyn ClientTrace>,
) -> Result<BackendResponse, ForwardError> {
    let backend = req.backend;
    let stream = TcpStream::connect((backend.address.as_str(), backend.port))
        .await
        .map_err(|source| ForwardError::Connect {
            backend: backend.to_string(),
            source,
        })?;
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(backend = %backend, error = %e, "failed to set TCP_NODELAY");
    }

    let io = TokioIo::new(TracedStream::new(stream, Arc::clone(&trace)));
    let (mut sender, conn) = hyper::client::conn::http1::handshake::<_, Full<Bytes>>(io)
        .await
        .map_err(ForwardError::Handshake)?;
    trace.got_conn();

    let backend_label = backend.to_string();
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::debug!(backend = %backend_label, error = %e, "backend connection closed with error");
        }
    });

    let mut builder = hyper::Request::builder()
        .method(req.method)
        .uri(req.path_and_query);
    if let Some(headers) = builder.headers_mut() {
        *headers = req.headers;
    }
    let request = builder.body(Full::new(req.body))?;

    let response = sender
        .send_request(request)
        .await
        .map_err(ForwardError::Request)?;

    let (parts, body) = response.into_parts();

    Ok(BackendResponse {
        status: parts.status,
        headers: parts.headers,
        body,
    })
}
