//! Execution channel that drives a board's raw REPL over a byte stream.
//!
//! The board is reached over TCP (typically a serial-to-TCP bridge). Raw mode
//! is entered once per session: two Ctrl-C interrupt whatever is running,
//! Ctrl-A switches to the raw REPL, and Ctrl-D soft-resets the board. Each
//! program is then uploaded in chunks and executed with Ctrl-D; the board
//! acknowledges with `OK`, then sends the program's stdout and stderr, each
//! terminated by `0x04`. Ctrl-B leaves raw mode when the session closes.

use crate::channel::{ExecutionChannel, Session};
use crate::error::ChannelError;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufStream};

const RAW_REPL_BANNER: &[u8] = b"raw REPL; CTRL-B to exit\r\n";
const SOFT_REBOOT: &[u8] = b"soft reboot\r\n";
const PROMPT: &[u8] = b">";
const EXEC_ACK: &[u8] = b"OK";
const END_OF_OUTPUT: u8 = 0x04;

const INTERRUPT: &[u8] = b"\r\x03\x03";
const ENTER_RAW_MODE: &[u8] = b"\r\x01";
const SOFT_RESET: &[u8] = b"\x04";
const EXECUTE: &[u8] = b"\x04";
const EXIT_RAW_MODE: &[u8] = b"\r\x02";

/// Size of the pieces a program is uploaded in; the board's input buffer
/// is small.
const UPLOAD_CHUNK_SIZE: usize = 256;
const UPLOAD_CHUNK_DELAY: Duration = Duration::from_millis(10);

/// Runs tests on a board reached over TCP.
#[derive(Clone, Debug)]
pub struct RawReplChannel {
    address: String,
    timeout: Duration,
}

impl RawReplChannel {
    /// Creates a channel for the board at the given address.
    ///
    /// # Arguments
    ///
    /// * `address` - `host:port` of the board's bridge.
    /// * `timeout` - Bound on connecting, entering raw mode, and each test.
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl ExecutionChannel for RawReplChannel {
    async fn open_session(&self) -> Result<Box<dyn Session>, ChannelError> {
        tracing::debug!(target: "channel", "connecting to {}", self.address);

        let stream = tokio::time::timeout(self.timeout, tokio::net::TcpStream::connect(&self.address))
            .await
            .map_err(|_| ChannelError::Timeout(self.timeout))??;

        let mut session = RawReplSession::new(stream, self.timeout);
        session.enter_raw_repl().await?;

        Ok(Box::new(session))
    }
}

/// A raw REPL session over any byte stream.
pub struct RawReplSession<S> {
    stream: BufStream<S>,
    timeout: Duration,
    /// Set when a test was abandoned midway and the board's state is unknown.
    needs_reset: bool,
}

impl<S> RawReplSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wraps a connected stream. Call [`Self::enter_raw_repl`] before running
    /// anything.
    pub fn new(stream: S, timeout: Duration) -> Self {
        Self {
            stream: BufStream::new(stream),
            timeout,
            needs_reset: false,
        }
    }

    /// Interrupts the board, enters the raw REPL, and soft-resets.
    pub async fn enter_raw_repl(&mut self) -> Result<(), ChannelError> {
        let timeout = self.timeout;
        tokio::time::timeout(timeout, self.enter_raw_repl_unbounded())
            .await
            .map_err(|_| ChannelError::Timeout(timeout))??;

        self.needs_reset = false;
        tracing::debug!(target: "channel", "entered raw REPL");

        Ok(())
    }

    async fn enter_raw_repl_unbounded(&mut self) -> Result<(), ChannelError> {
        self.send(INTERRUPT).await?;
        self.send(ENTER_RAW_MODE).await?;

        let mut banner = RAW_REPL_BANNER.to_vec();
        banner.extend_from_slice(PROMPT);
        self.read_until(&banner).await?;

        self.send(SOFT_RESET).await?;
        self.read_until(SOFT_REBOOT).await?;
        self.read_until(RAW_REPL_BANNER).await?;

        Ok(())
    }

    async fn exec(&mut self, code: &[u8]) -> Result<Vec<u8>, ChannelError> {
        self.read_until(PROMPT).await?;

        for (i, chunk) in code.chunks(UPLOAD_CHUNK_SIZE).enumerate() {
            if i > 0 {
                tokio::time::sleep(UPLOAD_CHUNK_DELAY).await;
            }
            self.send(chunk).await?;
        }
        self.send(EXECUTE).await?;

        let mut ack = [0; EXEC_ACK.len()];
        self.stream
            .read_exact(&mut ack)
            .await
            .map_err(map_read_error)?;
        if ack != EXEC_ACK {
            return Err(ChannelError::Protocol(format!(
                "board did not accept program: {:?}",
                String::from_utf8_lossy(&ack)
            )));
        }

        let mut output = self.read_until(&[END_OF_OUTPUT]).await?;
        output.pop();

        let mut stderr = self.read_until(&[END_OF_OUTPUT]).await?;
        stderr.pop();

        output.append(&mut stderr);
        Ok(output)
    }

    async fn send(&mut self, data: &[u8]) -> Result<(), ChannelError> {
        self.stream.write_all(data).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Reads until the data read so far ends with `ending`, returning all of
    /// it.
    async fn read_until(&mut self, ending: &[u8]) -> Result<Vec<u8>, ChannelError> {
        let mut data = vec![];

        while !data.ends_with(ending) {
            let b = self.stream.read_u8().await.map_err(map_read_error)?;
            data.push(b);
        }

        Ok(data)
    }
}

#[async_trait::async_trait]
impl<S> Session for RawReplSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn run(&mut self, source: &Path) -> Result<Vec<u8>, ChannelError> {
        let code = tokio::fs::read(source).await?;

        if self.needs_reset {
            self.enter_raw_repl().await?;
        }

        // Assume the worst until the board has answered in full.
        self.needs_reset = true;

        let timeout = self.timeout;
        let output = tokio::time::timeout(timeout, self.exec(&code))
            .await
            .map_err(|_| ChannelError::Timeout(timeout))??;

        self.needs_reset = false;

        Ok(output)
    }

    async fn close(self: Box<Self>) -> Result<(), ChannelError> {
        let mut session = *self;

        session.send(EXIT_RAW_MODE).await?;
        session.stream.shutdown().await?;

        tracing::debug!(target: "channel", "left raw REPL");
        Ok(())
    }
}

fn map_read_error(err: std::io::Error) -> ChannelError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        ChannelError::Protocol(String::from("connection closed by board"))
    } else {
        ChannelError::Io(err)
    }
}
