//! Fake IRC server.

use relaybot_proto::{Event, parse_line};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;

/// A listening socket the engine connects to.
pub struct FakeServer {
    listener: TcpListener,
}

impl FakeServer {
    pub async fn bind() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        Ok(Self { listener })
    }

    pub fn address(&self) -> String {
        self.listener.local_addr().expect("bound listener").to_string()
    }

    /// Accept the engine's next connection.
    pub async fn accept(&self) -> anyhow::Result<Peer> {
        let (stream, _) = timeout(Duration::from_secs(5), self.listener.accept()).await??;
        let (read_half, write_half) = stream.into_split();
        Ok(Peer {
            reader: BufReader::new(read_half),
            writer: write_half,
        })
    }
}

/// The server's side of one engine session.
pub struct Peer {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Peer {
    /// Send a raw line, adding the terminator.
    pub async fn send_raw(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Send raw bytes as one line, with no UTF-8 check.
    #[allow(dead_code)]
    pub async fn send_bytes(&mut self, line: &[u8]) -> anyhow::Result<()> {
        self.writer.write_all(line).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Close our sending side while leaving the engine's lines unread.
    #[allow(dead_code)]
    pub async fn shutdown_write(&mut self) -> anyhow::Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }

    /// Read lines until a QUIT arrives; false if the connection ends first.
    #[allow(dead_code)]
    pub async fn read_until_quit(&mut self) -> bool {
        while let Ok(line) = self.recv_line().await {
            if line.starts_with("QUIT") {
                return true;
            }
        }
        false
    }

    /// Receive one line with its terminator stripped.
    pub async fn recv_line(&mut self) -> anyhow::Result<String> {
        let mut line = String::new();
        let n = timeout(Duration::from_secs(5), self.reader.read_line(&mut line)).await??;
        if n == 0 {
            anyhow::bail!("connection closed");
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Receive and parse one line.
    #[allow(dead_code)]
    pub async fn recv(&mut self) -> anyhow::Result<Event> {
        let line = self.recv_line().await?;
        parse_line(&line).ok_or_else(|| anyhow::anyhow!("blank line from engine"))
    }

    /// Wait for the engine to close the connection.
    #[allow(dead_code)]
    pub async fn expect_closed(&mut self) -> anyhow::Result<()> {
        let mut line = String::new();
        let n = timeout(Duration::from_secs(5), self.reader.read_line(&mut line)).await??;
        if n != 0 {
            anyhow::bail!("expected EOF, got {:?}", line);
        }
        Ok(())
    }

    /// Read the registration burst and answer with a welcome.
    #[allow(dead_code)]
    pub async fn register(&mut self, nick: &str) -> anyhow::Result<()> {
        let first = self.recv_line().await?;
        anyhow::ensure!(first == format!("NICK {}", nick), "unexpected {:?}", first);
        let second = self.recv_line().await?;
        anyhow::ensure!(second.starts_with("USER "), "unexpected {:?}", second);
        self.send_raw(&format!(":irc.test 001 {} :Welcome", nick)).await
    }
}
