//! Streaming client for the exchange top-of-book feed

use futures_util::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::{timeout, timeout_at, Instant};
use tokio_tungstenite::{
    client_async_tls, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, instrument};
use url::Url;

use super::messages::parse_book_ticker;
use crate::common::channels::create_feed_state_channel;
use crate::common::errors::FeedError;
use crate::common::traits::QuoteSink;
use crate::common::types::FeedState;
use crate::config::types::FeedConfig;

type FeedStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Counters for the feed, readable from any task
#[derive(Debug, Default)]
pub struct FeedStats {
    pub quotes_published: AtomicU64,
    pub messages_skipped: AtomicU64,
    pub sessions_streamed: AtomicU64,
    pub reconnects: AtomicU64,
    pub idle_timeouts: AtomicU64,
}

impl FeedStats {
    pub fn quotes_published(&self) -> u64 {
        self.quotes_published.load(Ordering::Relaxed)
    }

    pub fn sessions_streamed(&self) -> u64 {
        self.sessions_streamed.load(Ordering::Relaxed)
    }

    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    pub fn idle_timeouts(&self) -> u64 {
        self.idle_timeouts.load(Ordering::Relaxed)
    }
}

/// Client for a single-instrument bookTicker stream
///
/// One call to [`run_session`](Self::run_session) walks
/// `Connecting → Handshaking → Streaming` and returns when the session
/// fails; the supervisor decides when to call it again.
pub struct MarketFeedClient {
    url: Url,
    host: String,
    port: u16,
    handshake_timeout: Duration,
    idle_timeout: Duration,
    sink: Arc<dyn QuoteSink>,
    state_tx: watch::Sender<FeedState>,
    stats: Arc<FeedStats>,
}

impl MarketFeedClient {
    /// Create a client publishing into `sink`
    pub fn new(config: &FeedConfig, sink: Arc<dyn QuoteSink>) -> Result<Self, FeedError> {
        let url = Url::parse(&config.url).map_err(|e| FeedError::InvalidUrl(e.to_string()))?;
        let host = url
            .host_str()
            .ok_or_else(|| FeedError::InvalidUrl(format!("{} has no host", config.url)))?
            .to_string();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| FeedError::InvalidUrl(format!("{} has no port", config.url)))?;
        let (state_tx, _) = create_feed_state_channel();

        Ok(Self {
            url,
            host,
            port,
            handshake_timeout: config.handshake_timeout(),
            idle_timeout: config.idle_timeout(),
            sink,
            state_tx,
            stats: Arc::new(FeedStats::default()),
        })
    }

    /// Override the handshake timeout
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Override the per-read idle timeout
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn state(&self) -> FeedState {
        *self.state_tx.borrow()
    }

    /// Receive every state transition
    pub fn subscribe_state(&self) -> watch::Receiver<FeedState> {
        self.state_tx.subscribe()
    }

    pub fn stats(&self) -> Arc<FeedStats> {
        self.stats.clone()
    }

    pub(crate) fn set_state(&self, state: FeedState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!("Feed state {} -> {}", previous, state);
        }
    }

    /// Run one connect-and-stream session until it fails
    ///
    /// A session never ends successfully: the stream is expected to run
    /// forever, so every return is an error for the supervisor to handle.
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn run_session(&self) -> Result<(), FeedError> {
        let ws = self.connect().await?;

        info!("Market feed connected");
        self.stats.sessions_streamed.fetch_add(1, Ordering::Relaxed);
        self.set_state(FeedState::Streaming);
        self.sink.set_feed_connected(true);

        let result = self.stream(ws).await;

        self.sink.set_feed_connected(false);
        self.set_state(FeedState::Disconnected);
        result
    }

    async fn connect(&self) -> Result<FeedStream, FeedError> {
        self.set_state(FeedState::Connecting);
        let tcp = match timeout(
            self.handshake_timeout,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        {
            Ok(Ok(tcp)) => tcp,
            Ok(Err(e)) => {
                self.set_state(FeedState::Disconnected);
                return Err(FeedError::Connect(e.to_string()));
            }
            Err(_) => {
                self.set_state(FeedState::Disconnected);
                return Err(FeedError::Connect(format!(
                    "timed out after {:?}",
                    self.handshake_timeout
                )));
            }
        };
        if let Err(e) = tcp.set_nodelay(true) {
            debug!("Could not set TCP_NODELAY: {}", e);
        }

        self.set_state(FeedState::Handshaking);
        match timeout(self.handshake_timeout, client_async_tls(self.url.as_str(), tcp)).await {
            Ok(Ok((ws, _response))) => Ok(ws),
            Ok(Err(e)) => {
                self.set_state(FeedState::Disconnected);
                Err(FeedError::Handshake(e.to_string()))
            }
            Err(_) => {
                self.set_state(FeedState::Disconnected);
                Err(FeedError::HandshakeTimeout(self.handshake_timeout))
            }
        }
    }

    /// Read until failure. Only data frames re-arm the idle deadline.
    async fn stream(&self, mut ws: FeedStream) -> Result<(), FeedError> {
        let mut deadline = Instant::now() + self.idle_timeout;

        loop {
            let next = match timeout_at(deadline, ws.next()).await {
                Ok(next) => next,
                Err(_) => return Err(FeedError::IdleTimeout(self.idle_timeout)),
            };

            match next {
                Some(Ok(Message::Text(text))) => {
                    self.handle_payload(&text);
                    deadline = Instant::now() + self.idle_timeout;
                }
                Some(Ok(Message::Binary(bytes))) => {
                    match std::str::from_utf8(&bytes) {
                        Ok(text) => self.handle_payload(text),
                        Err(_) => {
                            self.stats.messages_skipped.fetch_add(1, Ordering::Relaxed);
                            debug!("Skipping non UTF-8 binary frame ({} bytes)", bytes.len());
                        }
                    }
                    deadline = Instant::now() + self.idle_timeout;
                }
                Some(Ok(Message::Close(frame))) => {
                    return Err(FeedError::Closed(frame.map(|f| f.reason.to_string())));
                }
                Some(Ok(_)) => {
                    // Ping/Pong: tungstenite answers pings on the next read
                }
                Some(Err(e)) => return Err(e.into()),
                None => return Err(FeedError::Closed(None)),
            }
        }
    }

    fn handle_payload(&self, text: &str) {
        let capture_time_ms = chrono::Utc::now().timestamp_millis().max(0) as u64;
        match parse_book_ticker(text, capture_time_ms) {
            Some(quote) => {
                self.sink.publish_quote(&quote);
                self.stats.quotes_published.fetch_add(1, Ordering::Relaxed);
            }
            None => {
                self.stats.messages_skipped.fetch_add(1, Ordering::Relaxed);
                let preview: String = text.chars().take(200).collect();
                debug!("Skipping non-quote message: {}", preview);
            }
        }
    }
}
