//! Trait abstraction for the remote modem link to enable testing

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::{MonitorError, Result};

/// One inbound unit from the remote link
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Terminal output, possibly several lines
    Text(String),
    /// Terminal output in a binary frame
    Binary(Vec<u8>),
    /// Ping, pong or other control traffic
    Heartbeat,
}

impl Frame {
    /// Payload size counted towards link statistics
    pub fn data_len(&self) -> Option<usize> {
        match self {
            Frame::Text(text) => Some(text.len()),
            Frame::Binary(bytes) => Some(bytes.len()),
            Frame::Heartbeat => None,
        }
    }
}

/// One established connection to the modem terminal bridge
#[async_trait]
pub trait ModemLink: Send {
    /// Next frame, `Ok(None)` once the peer has closed
    ///
    /// Must be cancel safe.
    async fn recv(&mut self) -> Result<Option<Frame>>;

    /// Send a liveness probe
    async fn probe(&mut self) -> Result<()>;

    /// Close the connection, ignoring errors
    async fn close(&mut self);
}

/// Opens new [`ModemLink`]s
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn ModemLink>>;

    /// Endpoint description for logging
    fn endpoint(&self) -> &str;
}

/// Dials a WebSocket endpoint with a handshake timeout
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
    request_timeout: Duration,
}

impl WsConnector {
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            request_timeout,
        }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<Box<dyn ModemLink>> {
        let (stream, response) = tokio::time::timeout(self.request_timeout, connect_async(self.url.as_str()))
            .await
            .map_err(|_| MonitorError::ConnectTimeout {
                url: self.url.clone(),
                timeout: self.request_timeout,
            })??;

        debug!("Handshake with {} completed ({})", self.url, response.status());
        Ok(Box::new(WsLink { stream }))
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

/// Client side of a WebSocket session
pub struct WsLink {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl ModemLink for WsLink {
    async fn recv(&mut self) -> Result<Option<Frame>> {
        match self.stream.next().await {
            Some(Ok(Message::Text(text))) => Ok(Some(Frame::Text(text))),
            Some(Ok(Message::Binary(bytes))) => Ok(Some(Frame::Binary(bytes))),
            Some(Ok(Message::Close(_))) | None => Ok(None),
            Some(Ok(_)) => Ok(Some(Frame::Heartbeat)),
            Some(Err(e)) => Err(e.into()),
        }
    }

    async fn probe(&mut self) -> Result<()> {
        self.stream.send(Message::Ping(Vec::new())).await?;
        Ok(())
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// What a scripted link does once its frames run out
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub enum LinkEnd {
        /// Return a read error
        Fail,
        /// Report a clean close
        Close,
        /// Never deliver anything again
        Hang,
    }

    /// Scripted session: a list of frames, then `end`
    #[derive(Debug, Clone)]
    pub struct Session {
        pub frames: Vec<Frame>,
        pub end: LinkEnd,
        pub fail_probe: bool,
        pub stall_probe: bool,
        pub stall_close: bool,
    }

    impl Session {
        pub fn new(frames: Vec<Frame>, end: LinkEnd) -> Self {
            Self {
                frames,
                end,
                fail_probe: false,
                stall_probe: false,
                stall_close: false,
            }
        }

        pub fn with_failing_probe(mut self) -> Self {
            self.fail_probe = true;
            self
        }

        /// Probes never complete, like a ping stuck behind a full send buffer
        pub fn with_stalled_probe(mut self) -> Self {
            self.stall_probe = true;
            self
        }

        /// Close never completes
        pub fn with_stalled_close(mut self) -> Self {
            self.stall_close = true;
            self
        }
    }

    /// One entry of a connector script
    #[derive(Debug, Clone)]
    pub enum Dial {
        Refuse,
        Accept(Session),
    }

    /// Mock link replaying a [`Session`]
    pub struct MockLink {
        frames: VecDeque<Frame>,
        end: LinkEnd,
        fail_probe: bool,
        stall_probe: bool,
        stall_close: bool,
        probes: Arc<AtomicUsize>,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl ModemLink for MockLink {
        async fn recv(&mut self) -> Result<Option<Frame>> {
            if let Some(frame) = self.frames.pop_front() {
                return Ok(Some(frame));
            }
            match self.end {
                LinkEnd::Fail => Err(MonitorError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "Mock read error",
                ))),
                LinkEnd::Close => Ok(None),
                LinkEnd::Hang => futures::future::pending::<Result<Option<Frame>>>().await,
            }
        }

        async fn probe(&mut self) -> Result<()> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            if self.stall_probe {
                futures::future::pending::<()>().await;
            }
            if self.fail_probe {
                return Err(MonitorError::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "Mock probe error",
                )));
            }
            Ok(())
        }

        async fn close(&mut self) {
            if self.stall_close {
                futures::future::pending::<()>().await;
            }
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    /// Mock connector replaying a script of dial outcomes
    ///
    /// Once the script is exhausted every further dial is refused.
    #[derive(Clone)]
    pub struct MockConnector {
        script: Arc<Mutex<VecDeque<Dial>>>,
        pub dials: Arc<AtomicUsize>,
        pub probes: Arc<AtomicUsize>,
        pub closed: Arc<AtomicBool>,
        pub on_dial: Arc<Mutex<Option<Box<dyn Fn(usize) + Send>>>>,
    }

    impl MockConnector {
        pub fn new(script: Vec<Dial>) -> Self {
            Self {
                script: Arc::new(Mutex::new(script.into())),
                dials: Arc::new(AtomicUsize::new(0)),
                probes: Arc::new(AtomicUsize::new(0)),
                closed: Arc::new(AtomicBool::new(false)),
                on_dial: Arc::new(Mutex::new(None)),
            }
        }

        /// Run `hook` with the dial number before each dial
        pub fn set_on_dial(&self, hook: impl Fn(usize) + Send + 'static) {
            *self.on_dial.lock().unwrap() = Some(Box::new(hook));
        }

        pub fn dial_count(&self) -> usize {
            self.dials.load(Ordering::SeqCst)
        }

        pub fn probe_count(&self) -> usize {
            self.probes.load(Ordering::SeqCst)
        }

        pub fn link_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Connector for MockConnector {
        async fn connect(&self) -> Result<Box<dyn ModemLink>> {
            let dial = self.dials.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(hook) = self.on_dial.lock().unwrap().as_ref() {
                hook(dial);
            }

            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Dial::Accept(session)) => Ok(Box::new(MockLink {
                    frames: session.frames.into(),
                    end: session.end,
                    fail_probe: session.fail_probe,
                    stall_probe: session.stall_probe,
                    stall_close: session.stall_close,
                    probes: Arc::clone(&self.probes),
                    closed: Arc::clone(&self.closed),
                })),
                Some(Dial::Refuse) | None => Err(MonitorError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "Mock connection refused",
                ))),
            }
        }

        fn endpoint(&self) -> &str {
            "mock://modem"
        }
    }
}
