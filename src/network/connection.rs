//! Endpoint selection and connect/failover loop.

use crate::config::Config;
use std::io;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

/// Candidate endpoints with a cyclic cursor.
///
/// The cursor only moves when a connect attempt fails, and nothing resets
/// it, so after a failover later reconnects keep using the endpoint that
/// last worked.
#[derive(Debug, Clone)]
pub struct ServerList {
    endpoints: Vec<String>,
    cursor: usize,
}

impl ServerList {
    pub fn new(endpoints: Vec<String>) -> Self {
        Self {
            endpoints,
            cursor: 0,
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.endpoints.get(self.cursor).map(String::as_str)
    }

    /// Move to the next endpoint, wrapping around.
    pub fn advance(&mut self) {
        if !self.endpoints.is_empty() {
            self.cursor = (self.cursor + 1) % self.endpoints.len();
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

/// Transport lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        }
    }
}

/// Owns endpoint selection and publishes the transport state.
pub struct ConnectionManager {
    servers: ServerList,
    retry_delay: Duration,
    connect_timeout: Duration,
    state: watch::Sender<ConnectionState>,
    attempts: u64,
}

impl ConnectionManager {
    pub fn new(endpoints: Vec<String>, retry_delay: Duration, connect_timeout: Duration) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            servers: ServerList::new(endpoints),
            retry_delay,
            connect_timeout,
            state,
            attempts: 0,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.servers.clone(),
            config.connection.retry_delay(),
            config.connection.connect_timeout(),
        )
    }

    pub fn servers(&self) -> &ServerList {
        &self.servers
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Total connect attempts made so far.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    pub fn mark_disconnected(&self) {
        self.set_state(ConnectionState::Disconnected);
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
        crate::metrics::set_connected(state == ConnectionState::Connected);
    }

    /// Connect to the current endpoint, failing over until one answers.
    ///
    /// Never gives up; the only error is an empty endpoint list. Returns the
    /// stream and the endpoint it reached.
    pub async fn connect(&mut self) -> io::Result<(TcpStream, String)> {
        if self.servers.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "no endpoints configured",
            ));
        }
        self.set_state(ConnectionState::Connecting);

        loop {
            let endpoint = self.servers.current().unwrap_or_default().to_string();
            self.attempts += 1;

            match self.attempt(&endpoint).await {
                Ok(stream) => {
                    crate::metrics::record_connect_attempt(true);
                    info!(%endpoint, attempt = self.attempts, "Connected");
                    self.set_state(ConnectionState::Connected);
                    return Ok((stream, endpoint));
                }
                Err(e) => {
                    crate::metrics::record_connect_attempt(false);
                    self.servers.advance();
                    warn!(
                        %endpoint,
                        error = %e,
                        next = self.servers.current().unwrap_or_default(),
                        retry_in_ms = self.retry_delay.as_millis() as u64,
                        "Connect failed, failing over"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn attempt(&self, endpoint: &str) -> io::Result<TcpStream> {
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(endpoint)).await {
            Ok(result) => {
                let stream = result?;
                stream.set_nodelay(true)?;
                Ok(stream)
            }
            Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn dead_endpoint() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr.to_string()
    }

    #[test]
    fn test_server_list_wraps() {
        let mut list = ServerList::new(vec!["a:1".into(), "b:2".into()]);
        assert_eq!(list.current(), Some("a:1"));
        list.advance();
        assert_eq!(list.current(), Some("b:2"));
        list.advance();
        assert_eq!(list.current(), Some("a:1"));
    }

    #[test]
    fn test_empty_server_list() {
        let mut list = ServerList::new(Vec::new());
        list.advance();
        assert!(list.current().is_none());
        assert!(list.is_empty());
    }

    #[tokio::test]
    async fn test_empty_list_is_an_error() {
        let mut manager =
            ConnectionManager::new(Vec::new(), Duration::from_millis(1), Duration::from_secs(1));
        let err = manager.connect().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_fails_over_to_good_endpoint() {
        let good = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let good_addr = good.local_addr().unwrap().to_string();
        let bad_addr = dead_endpoint().await;

        let mut manager = ConnectionManager::new(
            vec![bad_addr, good_addr.clone()],
            Duration::from_millis(10),
            Duration::from_secs(2),
        );
        let (_stream, endpoint) = tokio::time::timeout(Duration::from_secs(5), manager.connect())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(endpoint, good_addr);
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(manager.servers().cursor(), 1);
        assert_eq!(manager.attempts(), 2);
    }

    #[tokio::test]
    async fn test_cursor_survives_reconnect() {
        let good = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let good_addr = good.local_addr().unwrap().to_string();
        let bad_addr = dead_endpoint().await;

        let mut manager = ConnectionManager::new(
            vec![bad_addr, good_addr],
            Duration::from_millis(10),
            Duration::from_secs(2),
        );
        manager.connect().await.unwrap();
        manager.mark_disconnected();
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        manager.connect().await.unwrap();
        assert_eq!(manager.servers().cursor(), 1);
        assert_eq!(manager.attempts(), 3);
    }

    #[tokio::test]
    async fn test_keeps_retrying_while_all_fail() {
        let mut manager = ConnectionManager::new(
            vec![dead_endpoint().await],
            Duration::from_millis(10),
            Duration::from_secs(1),
        );
        let mut state = manager.subscribe();
        let outcome = tokio::time::timeout(Duration::from_millis(200), manager.connect()).await;
        assert!(outcome.is_err());
        assert_eq!(*state.borrow_and_update(), ConnectionState::Connecting);
    }
}
