//! Short-lived TCP transactions with the tuner socket.
//!
//! Every call opens its own connection and walks it through one exchange:
//! 1. Connect
//! 2. Send the encoded command message
//! 3. Read until the peer closes
//! 4. Close
//!
//! Connecting and sending are each bounded by the configured timeout. The
//! whole receive phase shares one timeout, so a peer that trickles bytes
//! cannot hold the call open.
//!
//! Nothing is shared between calls, so a [`CommandChannel`] can be cloned and
//! used from many tasks at once. There is no pooling and no retry.
//!
//! # Example
//!
//! ```ignore
//! use tuner_bridge::tuner::CommandChannel;
//!
//! let channel = CommandChannel::new();
//! let result = channel.send("return Game.GetCurrentGameTurn()").await?;
//! println!("{}", result);
//! ```

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::response::parse_response;
use super::wire_format::build_message;
use crate::error::{BridgeError, Result};

/// Default tuner host (loopback).
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default tuner port.
pub const DEFAULT_PORT: u16 = 4318;

/// Default timeout applied to connect, send, and receive.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default cap on the size of one response.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 16 * 1024 * 1024;

/// Size of each socket read.
const READ_CHUNK_SIZE: usize = 4096;

/// Configuration for a command channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Host running the tuner server.
    pub host: String,
    /// Tuner TCP port.
    pub port: u16,
    /// Timeout for each of connect, send and receive.
    pub timeout: Duration,
    /// Responses larger than this fail with [`BridgeError::Protocol`].
    pub max_response_bytes: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

/// Stateless client for the tuner command socket.
#[derive(Debug, Clone, Default)]
pub struct CommandChannel {
    config: ChannelConfig,
}

impl CommandChannel {
    /// Create a channel with default host, port and timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a channel from a full configuration.
    pub fn with_config(config: ChannelConfig) -> Self {
        Self { config }
    }

    /// Set the host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the per-step timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the response size cap.
    pub fn max_response_bytes(mut self, max: usize) -> Self {
        self.config.max_response_bytes = max;
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// `host:port` of the tuner server.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Send a command in the main context (`0`) and return its result.
    pub async fn send(&self, command: &str) -> Result<String> {
        self.send_with_context(command, 0).await
    }

    /// Send a command in the given context and return its result.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::Connection`] if the connection is refused, times out,
    ///   or fails mid-transfer
    /// - [`BridgeError::Command`] if the game reports the command failed
    /// - [`BridgeError::Protocol`] if the response exceeds the size cap
    pub async fn send_with_context(&self, command: &str, context: u32) -> Result<String> {
        let message = build_message(command, context)?;
        tracing::debug!(
            "Sending {} byte command to {} (context {})",
            message.len(),
            self.addr(),
            context
        );

        let response = self.transact(&message).await?;
        parse_response(&response)
    }

    /// Run one raw exchange: send `message`, return every byte received
    /// until the peer closes the connection.
    pub async fn transact(&self, message: &[u8]) -> Result<Vec<u8>> {
        let mut stream = self.connect().await?;

        self.step("Send", stream.write_all(message)).await?;

        let response = tokio::time::timeout(self.config.timeout, self.read_to_close(&mut stream))
            .await
            .map_err(|_| self.timed_out("Receive"))??;

        // Peer already closed its side; a failed shutdown changes nothing.
        let _ = stream.shutdown().await;

        tracing::debug!("Received {} byte response from {}", response.len(), self.addr());
        Ok(response)
    }

    /// Check if the tuner server accepts connections.
    pub async fn is_reachable(&self) -> bool {
        match self.connect().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("Tuner not reachable: {}", e);
                false
            }
        }
    }

    /// Read until EOF, enforcing the response size cap.
    async fn read_to_close(&self, stream: &mut TcpStream) -> Result<Vec<u8>> {
        let mut response = Vec::new();
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            let n = stream
                .read(&mut chunk)
                .await
                .map_err(|e| self.connection_error("Receive", e))?;
            if n == 0 {
                return Ok(response);
            }
            if response.len() + n > self.config.max_response_bytes {
                return Err(BridgeError::Protocol(format!(
                    "Response from tuner at {} exceeds {} bytes",
                    self.addr(),
                    self.config.max_response_bytes
                )));
            }
            response.extend_from_slice(&chunk[..n]);
        }
    }

    async fn connect(&self) -> Result<TcpStream> {
        self.step(
            "Connect",
            TcpStream::connect((self.config.host.as_str(), self.config.port)),
        )
        .await
    }

    /// Await one I/O step under the configured timeout.
    async fn step<T>(&self, what: &str, fut: impl Future<Output = io::Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.config.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(self.connection_error(what, e)),
            Err(_) => Err(self.timed_out(what)),
        }
    }

    fn timed_out(&self, what: &str) -> BridgeError {
        BridgeError::Connection(format!(
            "{} to tuner at {} timed out after {:?}",
            what,
            self.addr(),
            self.config.timeout
        ))
    }

    fn connection_error(&self, what: &str, e: io::Error) -> BridgeError {
        let message = match e.kind() {
            io::ErrorKind::ConnectionRefused => {
                format!("Cannot connect to tuner at {}: connection refused", self.addr())
            }
            io::ErrorKind::TimedOut => {
                format!("{} to tuner at {} timed out", what, self.addr())
            }
            _ => format!("{} to tuner at {} failed: {}", what, self.addr(), e),
        };
        BridgeError::Connection(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuner::{Message, HEADER_SIZE};
    use tokio::net::TcpListener;

    /// Accept one connection, read one full message, reply with `chunks`, close.
    async fn serve_once(chunks: &'static [&'static str]) -> (u16, tokio::task::JoinHandle<Message>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let task = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut header = [0u8; HEADER_SIZE];
            socket.read_exact(&mut header).await.unwrap();
            let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
            let mut payload = vec![0u8; len];
            socket.read_exact(&mut payload).await.unwrap();

            for chunk in chunks {
                socket.write_all(chunk.as_bytes()).await.unwrap();
                socket.flush().await.unwrap();
                tokio::time::sleep(Duration::from_millis(5)).await;
            }

            let mut message = header.to_vec();
            message.extend(payload);
            Message::decode(&message).unwrap()
        });

        (port, task)
    }

    #[test]
    fn test_config_default() {
        let config = ChannelConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 4318);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.max_response_bytes, DEFAULT_MAX_RESPONSE_BYTES);
    }

    #[test]
    fn test_builder_overrides() {
        let channel = CommandChannel::new()
            .host("10.0.0.2")
            .port(5000)
            .timeout(Duration::from_millis(250));
        assert_eq!(channel.addr(), "10.0.0.2:5000");
        assert_eq!(channel.config().timeout, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_send_command_flow() {
        let (port, server) = serve_once(&["\x00\x01CIV6BRIDGE_RESULT:PONG:CIV6BRIDGE_END"]).await;
        let channel = CommandChannel::new().port(port);

        let result = channel.send("Game.AgentPing()").await.unwrap();
        assert_eq!(result, "PONG");

        let received = server.await.unwrap();
        assert_eq!(received, Message::new("Game.AgentPing()", 0));
    }

    #[tokio::test]
    async fn test_response_read_until_close() {
        let (port, server) = serve_once(&[
            "CIV6BRIDGE_RES",
            "ULT:OK:move",
            "_unit:CIV6BRIDGE_END",
        ])
        .await;
        let channel = CommandChannel::new().port(port);

        let result = channel.send_with_context("Game.AgentMoveUnit(0, 1, 2, 3)", 3).await.unwrap();
        assert_eq!(result, "OK:move_unit");
        assert_eq!(server.await.unwrap().context, 3);
    }

    #[tokio::test]
    async fn test_command_error() {
        let (port, _server) = serve_once(&["CIV6BRIDGE_RESULT:ERR:unit not found 99:CIV6BRIDGE_END"]).await;
        let channel = CommandChannel::new().port(port);

        match channel.send("Game.AgentMoveUnit(0, 99, 1, 1)").await {
            Err(BridgeError::Command(detail)) => assert_eq!(detail, "unit not found 99"),
            other => panic!("expected Command error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let channel = CommandChannel::new().port(port);
        let err = channel.send("x()").await.unwrap_err();
        assert!(matches!(err, BridgeError::Connection(_)));
        assert!(err.to_string().contains("refused"));
        assert!(!channel.is_reachable().await);
    }

    #[tokio::test]
    async fn test_silent_peer_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(socket);
        });

        let channel = CommandChannel::new()
            .port(port)
            .timeout(Duration::from_millis(200));
        let err = channel.send("x()").await.unwrap_err();
        assert!(matches!(err, BridgeError::Connection(_)));
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_trickling_peer_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            // Each byte arrives well inside the timeout; the response never ends.
            for _ in 0..100 {
                if socket.write_all(b"x").await.is_err() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        });

        let channel = CommandChannel::new()
            .port(port)
            .timeout(Duration::from_millis(300));
        let started = std::time::Instant::now();
        let err = channel.send("x()").await.unwrap_err();
        assert!(matches!(err, BridgeError::Connection(_)));
        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_oversized_response_rejected() {
        let (port, _server) =
            serve_once(&["CIV6BRIDGE_RESULT:", "0123456789abcdef", ":CIV6BRIDGE_END"]).await;
        let channel = CommandChannel::new().port(port).max_response_bytes(24);

        let err = channel.send("x()").await.unwrap_err();
        assert!(matches!(err, BridgeError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_is_reachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let channel = CommandChannel::new().port(port);
        assert!(channel.is_reachable().await);
    }

    #[tokio::test]
    async fn test_concurrent_calls_use_separate_connections() {
        let (port_a, server_a) = serve_once(&["CIV6BRIDGE_RESULT:a:CIV6BRIDGE_END"]).await;
        let (port_b, server_b) = serve_once(&["CIV6BRIDGE_RESULT:b:CIV6BRIDGE_END"]).await;

        let channel = CommandChannel::new();
        let a = channel.clone().port(port_a);
        let b = channel.port(port_b);

        let (ra, rb) = tokio::join!(a.send("a()"), b.send("b()"));
        assert_eq!(ra.unwrap(), "a");
        assert_eq!(rb.unwrap(), "b");
        assert_eq!(server_a.await.unwrap().command, "a()");
        assert_eq!(server_b.await.unwrap().command, "b()");
    }
}
