//! Shared test support: an in-process host bridge speaking the full channel
//! protocol and a config provider with a working refresh hook.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use request_gateway::{
    ChannelMessage, ChannelReply, ConfigProvider, GatewayConfig, GatewayError, GatewayResult,
    HostBridge, StreamEvent, StreamHandle, StreamOpen,
};

/// Install a log subscriber when `RUST_LOG` is set, so failing runs can be
/// traced; repeated calls are a no-op
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Scripted behavior for one round trip
pub enum ScriptedReply {
    Reply(GatewayResult<ChannelReply>),
    /// Never answer; exercises cancellation of pending sends
    Hang,
}

/// Scripted behavior for one stream channel
pub struct ScriptedStream {
    pub events: Vec<StreamEvent>,
    /// Keep the channel open after the last event instead of dropping it
    pub hang_after: bool,
}

/// In-process [`HostBridge`] with scripted replies and streams
#[derive(Default)]
pub struct FakeHostBridge {
    replies: Mutex<VecDeque<ScriptedReply>>,
    streams: Mutex<VecDeque<ScriptedStream>>,
    seen: Mutex<Vec<ChannelMessage>>,
    opens: Mutex<Vec<StreamOpen>>,
    active_streams: Arc<AtomicUsize>,
}

impl FakeHostBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_reply(&self, reply: ChannelReply) {
        self.replies.lock().push_back(ScriptedReply::Reply(Ok(reply)));
    }

    pub fn push_send_error(&self, message: &str) {
        self.replies
            .lock()
            .push_back(ScriptedReply::Reply(Err(GatewayError::transport(message))));
    }

    pub fn push_hang(&self) {
        self.replies.lock().push_back(ScriptedReply::Hang);
    }

    pub fn push_stream(&self, events: Vec<StreamEvent>, hang_after: bool) {
        self.streams
            .lock()
            .push_back(ScriptedStream { events, hang_after });
    }

    /// Messages received over the request/upload channel
    pub fn seen(&self) -> Vec<ChannelMessage> {
        self.seen.lock().clone()
    }

    /// Stream-open messages received
    pub fn opens(&self) -> Vec<StreamOpen> {
        self.opens.lock().clone()
    }

    /// Streams whose host-side task is still alive
    pub fn active_streams(&self) -> usize {
        self.active_streams.load(Ordering::SeqCst)
    }
}

struct ActiveGuard(Arc<AtomicUsize>);

impl ActiveGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl HostBridge for FakeHostBridge {
    async fn round_trip(&self, message: ChannelMessage) -> GatewayResult<ChannelReply> {
        self.seen.lock().push(message);
        let scripted = self.replies.lock().pop_front();
        match scripted {
            Some(ScriptedReply::Reply(reply)) => reply,
            Some(ScriptedReply::Hang) => std::future::pending().await,
            None => Ok(ChannelReply {
                ok: true,
                status: Some(200),
                error: None,
                data: Some(serde_json::json!({})),
            }),
        }
    }

    async fn open_stream(&self, open: StreamOpen) -> GatewayResult<StreamHandle> {
        self.opens.lock().push(open);
        let script = self
            .streams
            .lock()
            .pop_front()
            .ok_or_else(|| GatewayError::transport("no stream scripted"))?;

        let (tx, rx) = mpsc::channel(32);
        let teardown = CancellationToken::new();
        let token = teardown.clone();
        let guard = ActiveGuard::new(self.active_streams.clone());

        tokio::spawn(async move {
            let _guard = guard;
            for event in script.events {
                tokio::select! {
                    _ = token.cancelled() => return,
                    sent = tx.send(event) => {
                        if sent.is_err() {
                            return;
                        }
                    }
                }
            }
            if script.hang_after {
                token.cancelled().await;
            }
        });

        Ok(StreamHandle::new(rx, teardown))
    }
}

/// Config provider whose refresh hook installs a new access token
pub struct RefreshingProvider {
    config: RwLock<GatewayConfig>,
    refreshed_token: Option<String>,
    pub refreshes: AtomicUsize,
}

impl RefreshingProvider {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config: RwLock::new(config),
            refreshed_token: None,
            refreshes: AtomicUsize::new(0),
        }
    }

    pub fn with_refreshed_token(config: GatewayConfig, token: &str) -> Self {
        Self {
            config: RwLock::new(config),
            refreshed_token: Some(token.to_string()),
            refreshes: AtomicUsize::new(0),
        }
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfigProvider for RefreshingProvider {
    async fn get_config(&self) -> GatewayResult<GatewayConfig> {
        Ok(self.config.read().clone())
    }

    async fn refresh_auth(&self) -> GatewayResult<bool> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        match &self.refreshed_token {
            Some(token) => {
                self.config.write().access_token = Some(token.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
