//! Trait abstraction for subscriber transports to enable testing

use async_trait::async_trait;
use futures::stream::SplitSink;
use futures::SinkExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::error::Result;

/// Outbound half of one subscriber connection
#[async_trait]
pub trait EventSink: Send {
    /// Write one serialized event
    async fn send_json(&mut self, json: &str) -> Result<()>;

    /// Close the transport, ignoring errors
    async fn close(&mut self);
}

/// Write half of a WebSocket subscriber
pub struct WsSink<S> {
    sink: SplitSink<WebSocketStream<S>, Message>,
}

impl<S> WsSink<S> {
    pub fn new(sink: SplitSink<WebSocketStream<S>, Message>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl<S> EventSink for WsSink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send_json(&mut self, json: &str) -> Result<()> {
        self.sink.send(Message::Text(json.to_string())).await?;
        Ok(())
    }

    async fn close(&mut self) {
        let _ = self.sink.close().await;
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use crate::error::MonitorError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Mock subscriber recording every frame it accepts
    #[derive(Clone, Default)]
    pub struct MockSink {
        pub received: Arc<Mutex<Vec<String>>>,
        pub fail_writes: Arc<AtomicBool>,
        pub stall_writes: Arc<AtomicBool>,
        pub closed: Arc<AtomicBool>,
    }

    impl MockSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn received(&self) -> Vec<String> {
            self.received.lock().unwrap().clone()
        }

        pub fn set_fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        pub fn set_stall_writes(&self, stall: bool) {
            self.stall_writes.store(stall, Ordering::SeqCst);
        }

        pub fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EventSink for MockSink {
        async fn send_json(&mut self, json: &str) -> Result<()> {
            if self.stall_writes.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(MonitorError::Subscriber("Mock write error".to_string()));
            }
            self.received.lock().unwrap().push(json.to_string());
            Ok(())
        }

        async fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }
}
