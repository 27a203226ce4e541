//! Error types for the application

use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type alias using our BridgeError
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Top-level error type for the bridge
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Shared-memory channel errors (fatal at startup)
    #[error("Shared channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Market feed errors
    #[error("Market feed error: {0}")]
    Feed(#[from] FeedError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised while creating or mapping the shared region
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Underlying file or mapping failure (permissions, resource exhaustion)
    #[error("I/O error on shared region: {0}")]
    Io(#[from] std::io::Error),

    /// Requested size cannot hold the channel layout
    #[error("Shared region of {actual} bytes is smaller than the {required}-byte layout")]
    RegionTooSmall { required: usize, actual: usize },

    /// An existing region was found with a different size
    #[error("Shared region size mismatch: expected {expected} bytes, found {actual}")]
    SizeMismatch { expected: usize, actual: u64 },

    /// Region name is empty or contains a path separator
    #[error("Invalid shared region name: {0:?}")]
    InvalidName(String),
}

/// Transport-level failures of the market feed; all are recoverable
#[derive(Error, Debug)]
pub enum FeedError {
    /// Endpoint could not be parsed or lacks a host
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(String),

    /// Resolve / TCP connect failure
    #[error("Connect failed: {0}")]
    Connect(String),

    /// TLS or websocket handshake did not finish in time
    #[error("Handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// TLS or websocket handshake failure
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// No data frame arrived within the idle window
    #[error("No data received for {0:?} (zombie connection)")]
    IdleTimeout(Duration),

    /// Server closed the stream
    #[error("Stream closed: {}", .0.as_deref().unwrap_or("no reason"))]
    Closed(Option<String>),

    /// WebSocket protocol or I/O error while streaming
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// The reconnect policy stopped retrying
    #[error("Giving up after {attempts} reconnect attempts")]
    RetriesExhausted { attempts: u32 },
}

impl From<tokio_tungstenite::tungstenite::Error> for FeedError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        FeedError::WebSocket(err.to_string())
    }
}

/// Balance check failures on the virtual ledger
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Insufficient cash: required {required}, available {available}")]
    InsufficientCash { required: Decimal, available: Decimal },

    #[error("Insufficient asset: required {required}, available {available}")]
    InsufficientAsset { required: Decimal, available: Decimal },

    /// Notional, fee or resulting balance does not fit a `Decimal`
    #[error("Amount overflow: {quantity} @ {price}")]
    Overflow { price: Decimal, quantity: Decimal },
}
