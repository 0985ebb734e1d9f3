//! # Stream Dispatcher
//!
//! One long-lived streaming call per duplex channel to the host process.
//! The host posts `data`/`done`/`error` events; the consumer pulls chunks
//! from a [`ChunkStream`] as the sole source of truth for completion.
//!
//! Consumption is event-driven: the bounded channel is the chunk queue and
//! its blocking receive is the wake primitive, so there is no poll interval.
//! Any chunks already queued are always delivered before a terminal error is
//! raised, and teardown runs on every exit path, including the consumer
//! dropping the stream early.

use futures::stream::{self, Stream};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::core::error::{GatewayError, GatewayResult};
use crate::core::types::{RequestBody, RequestDescriptor};
use crate::dispatch::RequestGateway;
use crate::transport::channel::{StreamEvent, StreamHandle, StreamOpen};

impl RequestGateway {
    /// Open a streaming call and return its chunk sequence
    ///
    /// Streaming is message-channel only: without a host bridge the call
    /// fails with a transport error.
    #[instrument(skip(self, descriptor), fields(method = %descriptor.method, path = %descriptor.path))]
    pub async fn stream(&self, descriptor: RequestDescriptor) -> GatewayResult<ChunkStream> {
        descriptor.validate()?;
        let bridge = self
            .host_bridge()
            .ok_or_else(|| GatewayError::transport("streaming requires the host message channel"))?;

        let body = match &descriptor.body {
            RequestBody::Empty => None,
            RequestBody::Json(value) => Some(value.clone()),
            RequestBody::Text(text) => Some(serde_json::Value::String(text.clone())),
            RequestBody::Binary { .. } => {
                return Err(GatewayError::config(
                    "binary bodies cannot be streamed; use the upload dispatcher",
                ));
            }
        };

        let open = StreamOpen {
            path: descriptor.path.clone(),
            method: descriptor.method.clone(),
            headers: descriptor.headers.clone(),
            body,
            stream_idle_timeout_ms: self.timeouts().stream_idle_timeout.as_millis() as u64,
        };

        let handle = bridge
            .open_stream(open)
            .await
            .map_err(|err| GatewayError::transport(format!("failed to open stream channel: {err}")))?;

        Ok(ChunkStream::new(handle, descriptor.cancellation.clone()))
    }
}

/// Lazy, finite, non-restartable sequence of text chunks from one
/// streaming call
///
/// Yields chunks in arrival order, then at most one terminal error, then
/// `None` forever. Dropping the stream tears the channel down.
#[derive(Debug)]
pub struct ChunkStream {
    events: mpsc::Receiver<StreamEvent>,
    teardown: CancellationToken,
    cancellation: Option<CancellationToken>,
    done: bool,
    terminal: Option<GatewayError>,
}

impl ChunkStream {
    pub(crate) fn new(handle: StreamHandle, cancellation: Option<CancellationToken>) -> Self {
        let (events, teardown) = handle.into_parts();
        Self {
            events,
            teardown,
            cancellation,
            done: false,
            terminal: None,
        }
    }

    /// Pull the next chunk
    ///
    /// Returns `Some(Ok(chunk))` for each chunk, `Some(Err(..))` exactly once
    /// for a terminal failure after all queued chunks have been yielded, and
    /// `None` once the sequence is exhausted.
    pub async fn next_chunk(&mut self) -> Option<GatewayResult<String>> {
        loop {
            // drain whatever is already queued before honoring terminal state
            match self.events.try_recv() {
                Ok(event) => {
                    if let Some(chunk) = self.apply(event) {
                        return Some(Ok(chunk));
                    }
                    continue;
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    if !self.done {
                        self.finish(Some(disconnected_error()));
                    }
                }
            }

            if self.done {
                return self.terminal.take().map(Err);
            }

            tokio::select! {
                biased;
                _ = wait_cancelled(self.cancellation.as_ref()) => {
                    debug!("stream cancelled by caller");
                    self.finish(Some(GatewayError::Cancelled));
                }
                event = self.events.recv() => match event {
                    Some(event) => {
                        if let Some(chunk) = self.apply(event) {
                            return Some(Ok(chunk));
                        }
                    }
                    None => self.finish(Some(disconnected_error())),
                },
            }
        }
    }

    /// Adapt into a `futures::Stream` of chunk results
    pub fn into_stream(self) -> impl Stream<Item = GatewayResult<String>> {
        stream::unfold(self, |mut chunks| async move {
            chunks.next_chunk().await.map(|item| (item, chunks))
        })
    }

    fn apply(&mut self, event: StreamEvent) -> Option<String> {
        match event {
            // never yield past the terminal event
            StreamEvent::Data { data } => (!self.done).then_some(data),
            StreamEvent::Done => {
                self.finish(None);
                None
            }
            StreamEvent::Error { message } => {
                self.finish(Some(GatewayError::transport(message)));
                None
            }
        }
    }

    fn finish(&mut self, terminal: Option<GatewayError>) {
        if !self.done {
            self.done = true;
            self.terminal = terminal;
        }
        self.teardown.cancel();
    }
}

impl Drop for ChunkStream {
    fn drop(&mut self) {
        // consumer may abandon the stream early; the host call must still be
        // torn down and its listeners detached
        self.teardown.cancel();
    }
}

fn disconnected_error() -> GatewayError {
    GatewayError::transport("stream channel disconnected before completion")
}

async fn wait_cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}
