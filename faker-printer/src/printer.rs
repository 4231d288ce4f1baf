//! Network client for raw port 9100 printers
//!
//! Used to replay jobs into the listener and to query it the way a POS
//! terminal does.

use crate::error::{PrintError, PrintResult};
use crate::opcode::{DLE, EOT};
use crate::responder::PRINTER_MODEL;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, instrument};

/// Network printer (TCP port 9100)
#[derive(Debug, Clone)]
pub struct NetworkPrinter {
    addr: SocketAddr,
    timeout: Duration,
}

impl NetworkPrinter {
    /// Create a new network printer
    pub fn new(host: &str, port: u16) -> PrintResult<Self> {
        Self::from_addr(&format!("{}:{}", host, port))
    }

    /// Create from a socket address string (e.g., "192.168.1.100:9100")
    pub fn from_addr(addr: &str) -> PrintResult<Self> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|_| PrintError::InvalidConfig(format!("Invalid address: {}", addr)))?;

        Ok(Self {
            addr,
            timeout: Duration::from_secs(5),
        })
    }

    /// Set connect/read timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the printer address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    async fn connect(&self) -> PrintResult<TcpStream> {
        tokio::time::timeout(self.timeout, TcpStream::connect(self.addr))
            .await
            .map_err(|_| PrintError::Timeout(format!("Connection timeout: {}", self.addr)))?
            .map_err(|e| PrintError::Connection(format!("{}: {}", self.addr, e)))
    }

    /// Send a complete job and return every reply until the printer closes
    ///
    /// The write half is shut down after the job, so the printer sees the end
    /// of the session right away. Replies are drained before the socket is
    /// dropped; closing with unread replies would reset the connection.
    #[instrument(skip(self, data), fields(addr = %self.addr, data_len = data.len()))]
    pub async fn print(&self, data: &[u8]) -> PrintResult<Vec<u8>> {
        let mut stream = self.connect().await?;
        debug!("Connected, sending {} bytes", data.len());

        stream.write_all(data).await?;
        stream.flush().await?;
        stream.shutdown().await?;

        let mut replies = Vec::new();
        tokio::time::timeout(self.timeout, stream.read_to_end(&mut replies))
            .await
            .map_err(|_| PrintError::Timeout(format!("Printer {} kept the job open", self.addr)))??;

        info!(replies = replies.len(), "Print job sent");
        Ok(replies)
    }

    /// Send `DLE EOT n` and return the status byte
    #[instrument(skip(self), fields(addr = %self.addr))]
    pub async fn query_status(&self, n: u8) -> PrintResult<u8> {
        let mut stream = self.connect().await?;
        stream.write_all(&[DLE, EOT, n]).await?;

        let mut byte = [0u8; 1];
        self.read_reply(&mut stream, &mut byte).await?;
        Ok(byte[0])
    }

    /// Send `GS I 1` and return the model string (without the trailing NUL)
    #[instrument(skip(self), fields(addr = %self.addr))]
    pub async fn identify(&self) -> PrintResult<String> {
        let mut stream = self.connect().await?;
        stream.write_all(&[0x1D, b'I', 0x01]).await?;

        let mut reply = vec![0u8; PRINTER_MODEL.len()];
        self.read_reply(&mut stream, &mut reply).await?;
        let model = reply.split(|&b| b == 0).next().unwrap_or_default();
        Ok(String::from_utf8_lossy(model).into_owned())
    }

    async fn read_reply(&self, stream: &mut TcpStream, buf: &mut [u8]) -> PrintResult<()> {
        tokio::time::timeout(self.timeout, stream.read_exact(buf))
            .await
            .map_err(|_| PrintError::Timeout(format!("No reply from {}", self.addr)))??;
        Ok(())
    }
}
