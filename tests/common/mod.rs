#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use lte_monitor::broadcast::Broadcaster;
use lte_monitor::config::ModemConfig;
use lte_monitor::error::Result;
use lte_monitor::ingest::LineProcessor;
use lte_monitor::modem::parser::LineParser;
use lte_monitor::server::{ApiServer, AppState};
use lte_monitor::shutdown::{self, ShutdownTrigger};
use lte_monitor::store::TelemetryStore;

pub const HCSQ: &str = "^HCSQ:\"LTE\",90,80,166,20";
pub const DSFLOWRPT: &str =
    "^DSFLOWRPT:00002CB1,00000154,000000EB,00000000125DBB6B,000000000F51DB0A,00000000,00000000";

/// Store, broadcaster and HTTP server wired like the binary does
pub struct Stack {
    pub addr: SocketAddr,
    pub store: Arc<TelemetryStore>,
    pub broadcaster: Broadcaster,
    pub processor: LineProcessor,
    pub trigger: ShutdownTrigger,
    pub server: JoinHandle<Result<()>>,
}

pub async fn start_stack() -> Stack {
    let (trigger, shutdown) = shutdown::channel();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let store = Arc::new(TelemetryStore::with_events(100, events_tx));
    let broadcaster = Broadcaster::new(Duration::from_secs(1));
    tokio::spawn(broadcaster.clone().run(events_rx, shutdown.clone()));

    let state = AppState::new(Arc::clone(&store), broadcaster.clone(), ModemConfig::default());
    let server = ApiServer::bind(
        "127.0.0.1:0".parse().unwrap(),
        state,
        Duration::from_secs(5),
        Duration::from_secs(1),
    )
    .await
    .unwrap();
    let addr = server.local_addr().unwrap();
    let server = tokio::spawn(server.run(shutdown));

    Stack {
        addr,
        processor: LineProcessor::new(LineParser::new(), Arc::clone(&store)),
        store,
        broadcaster,
        trigger,
        server,
    }
}

/// Minimal HTTP/1.1 client: returns status code and parsed JSON body
pub async fn request(addr: SocketAddr, method: &str, path: &str) -> (u16, serde_json::Value) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let req = format!(
        "{} {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\nContent-Length: 0\r\n\r\n",
        method, path, addr
    );
    stream.write_all(req.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    tokio::time::timeout(Duration::from_secs(2), stream.read_to_end(&mut raw))
        .await
        .expect("response in time")
        .unwrap();
    let raw = String::from_utf8(raw).unwrap();

    let (head, body) = raw.split_once("\r\n\r\n").expect("header terminator");
    let status: u16 = head
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .expect("status code");
    (status, serde_json::from_str(body).unwrap())
}

pub async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    for _ in 0..400 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("Timed out waiting for {}", what);
}
