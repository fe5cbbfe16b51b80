//! Resilient remote client
//!
//! Holds at most one active session with the modem terminal bridge. A session
//! ends on read failure, probe failure, read deadline or peer close; the outer
//! loop then waits `reconnect_delay` and dials again until the retry budget
//! is spent. Shutdown cancels both the dial/backoff wait and the session.

use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use super::link::{Connector, Frame, ModemLink};
use super::LineProcessor;
use crate::config::ModemConfig;
use crate::error::MonitorError;
use crate::modem::protocol::Source;
use crate::shutdown::Shutdown;

/// Retry and keepalive timing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectPolicy {
    pub reconnect_delay: Duration,
    pub ping_interval: Duration,
    /// 0 = unlimited
    pub max_reconnect: u32,
    /// Longest wait for a graceful close of an ended session
    pub close_timeout: Duration,
}

impl ReconnectPolicy {
    /// A session with no inbound frame for this long is dead
    pub fn read_deadline(&self) -> Duration {
        self.ping_interval * 2
    }
}

impl From<&ModemConfig> for ReconnectPolicy {
    fn from(config: &ModemConfig) -> Self {
        Self {
            reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
            ping_interval: Duration::from_millis(config.ping_interval_ms),
            max_reconnect: config.max_reconnect,
            close_timeout: config.request_timeout(),
        }
    }
}

/// Why [`ResilientClient::run`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientExit {
    /// Shutdown was requested
    Shutdown,
    /// `max_reconnect` consecutive retries failed
    Exhausted { attempts: u32 },
}

enum SessionEnd {
    Failed(MonitorError),
    Shutdown,
}

/// Remote ingestion source with reconnect and backoff
pub struct ResilientClient<C> {
    connector: C,
    processor: LineProcessor,
    policy: ReconnectPolicy,
}

impl<C: Connector> ResilientClient<C> {
    pub fn new(connector: C, processor: LineProcessor, policy: ReconnectPolicy) -> Self {
        Self {
            connector,
            processor,
            policy,
        }
    }

    /// Run until shutdown or until the retry budget is spent
    pub async fn run(&self, mut shutdown: Shutdown) -> ClientExit {
        let store = self.processor.store();
        let endpoint = self.connector.endpoint();
        let mut consecutive_retries: u32 = 0;

        info!("Connecting to modem at {}", endpoint);

        loop {
            let dialed = tokio::select! {
                result = self.connector.connect() => result,
                _ = shutdown.wait() => return ClientExit::Shutdown,
            };

            if consecutive_retries > 0 {
                store.record_reconnect_attempt();
            }

            match dialed {
                Ok(link) => {
                    consecutive_retries = 0;
                    store.mark_connected();
                    info!("Connected to modem at {}", endpoint);

                    match self.run_session(link, &mut shutdown).await {
                        SessionEnd::Shutdown => {
                            info!("Modem session closed by shutdown");
                            return ClientExit::Shutdown;
                        }
                        SessionEnd::Failed(e) => {
                            store.mark_disconnected();
                            warn!("Modem session with {} ended: {}", endpoint, e);
                        }
                    }
                }
                Err(e) => warn!("Failed to connect to {}: {}", endpoint, e),
            }

            if self.policy.max_reconnect > 0 && consecutive_retries >= self.policy.max_reconnect {
                error!(
                    "Max reconnection attempts ({}) reached, remote source stopped",
                    self.policy.max_reconnect
                );
                return ClientExit::Exhausted {
                    attempts: consecutive_retries,
                };
            }

            tokio::select! {
                _ = tokio::time::sleep(self.policy.reconnect_delay) => {}
                _ = shutdown.wait() => return ClientExit::Shutdown,
            }

            consecutive_retries += 1;
            info!("Reconnecting to {} (attempt {})", endpoint, consecutive_retries);
        }
    }

    async fn run_session(&self, mut link: Box<dyn ModemLink>, shutdown: &mut Shutdown) -> SessionEnd {
        let ping_interval = self.policy.ping_interval;
        let read_deadline = self.policy.read_deadline();

        let mut ticker = tokio::time::interval_at(Instant::now() + ping_interval, ping_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let deadline = tokio::time::sleep(read_deadline);
        tokio::pin!(deadline);

        let end = loop {
            tokio::select! {
                frame = link.recv() => match frame {
                    Ok(Some(frame)) => {
                        deadline.as_mut().reset(Instant::now() + read_deadline);
                        self.handle_frame(frame);
                    }
                    Ok(None) => break SessionEnd::Failed(MonitorError::PeerClosed),
                    Err(e) => break SessionEnd::Failed(e),
                },
                _ = ticker.tick() => {
                    // A probe stuck on a full send buffer counts as a dead link
                    let probed = tokio::select! {
                        result = tokio::time::timeout(read_deadline, link.probe()) => result,
                        _ = shutdown.wait() => break SessionEnd::Shutdown,
                    };
                    match probed {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => break SessionEnd::Failed(e),
                        Err(_) => break SessionEnd::Failed(MonitorError::WriteTimeout(read_deadline)),
                    }
                }
                _ = &mut deadline => break SessionEnd::Failed(MonitorError::ReadTimeout(read_deadline)),
                _ = shutdown.wait() => break SessionEnd::Shutdown,
            }
        };

        if tokio::time::timeout(self.policy.close_timeout, link.close()).await.is_err() {
            warn!("Modem link did not close within {:?}, dropping it", self.policy.close_timeout);
        }
        end
    }

    fn handle_frame(&self, frame: Frame) {
        if let Some(len) = frame.data_len() {
            self.processor.store().record_frame(len);
        }

        match frame {
            Frame::Text(text) => self.process_text(&text),
            Frame::Binary(bytes) => self.process_text(&String::from_utf8_lossy(&bytes)),
            Frame::Heartbeat => {}
        }
    }

    /// One frame may carry several terminal lines
    fn process_text(&self, text: &str) {
        for line in text.lines() {
            self.processor.process_line(line, Source::Ttyd);
        }
    }
}
