//! Command transport
//!
//! Runs one request/response exchange at a time over a byte-stream link.
//! Each call to [`CommandTransport::send`] frames the payload, writes it, and
//! feeds every incoming byte to the owned [`PacketDecoder`] until a validated
//! reply is ready, the decoder rejects the stream, the link fails, or the
//! deadline passes. Nothing is retried here.

use std::future::poll_fn;
use std::io;
use std::pin::Pin;
use std::task::Poll;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tracing::{debug, trace, warn};

use super::commands::operation_name;
use super::{encode, PacketDecoder, ProtocolError};

/// Size of the buffer used for each link read
const READ_CHUNK: usize = 64;

/// A duplex byte stream to the printer.
///
/// Implemented for every `AsyncRead + AsyncWrite` stream, so a
/// `tokio_serial::SerialStream` and a `tokio::io::DuplexStream` both qualify.
pub trait Link: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Link for T {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exchange {
    Idle,
    /// Set while a request is on the wire. Still set on entry to `send` only
    /// if the previous `send` future was dropped before it resolved.
    AwaitingReply,
}

/// Request/response transport owning a link and its packet decoder
#[derive(Debug)]
pub struct CommandTransport<L> {
    link: L,
    decoder: PacketDecoder,
    exchange: Exchange,
}

impl<L: Link> CommandTransport<L> {
    /// Attach a transport to a link
    pub fn new(link: L) -> Self {
        Self {
            link,
            decoder: PacketDecoder::new(),
            exchange: Exchange::Idle,
        }
    }

    /// Whether an abandoned request is blocking further sends
    pub fn is_busy(&self) -> bool {
        self.exchange == Exchange::AwaitingReply
    }

    /// Borrow the underlying link
    pub fn get_ref(&self) -> &L {
        &self.link
    }

    /// Detach the underlying link
    pub fn into_inner(self) -> L {
        self.link
    }

    /// Send one command payload and wait for its reply payload.
    ///
    /// The timeout covers writing the request and receiving the whole reply.
    /// Bytes that arrive after the reply in the same read are dropped.
    pub async fn send(&mut self, payload: &[u8], timeout: Duration) -> Result<Vec<u8>, ProtocolError> {
        if self.is_busy() {
            return Err(ProtocolError::RequestInFlight);
        }

        self.decoder.reset();
        let packet = encode(payload)?;
        let operation = operation_name(payload);

        self.discard_stale_input().await?;

        self.exchange = Exchange::AwaitingReply;
        let result = match tokio::time::timeout(timeout, self.exchange_packet(&packet)).await {
            Ok(result) => result,
            Err(_) => Err(ProtocolError::Timeout {
                operation: operation.clone(),
                timeout,
            }),
        };
        self.decoder.reset();
        self.exchange = Exchange::Idle;

        match &result {
            Ok(reply) => debug!(%operation, reply_len = reply.len(), "exchange complete"),
            Err(e) => warn!(%operation, error = %e, "exchange failed"),
        }
        result
    }

    /// Clear the decoder and any abandoned request, dropping buffered input
    pub async fn reset(&mut self) -> Result<(), ProtocolError> {
        self.decoder.reset();
        self.exchange = Exchange::Idle;
        self.discard_stale_input().await
    }

    /// Shut down the write half of the link
    pub async fn shutdown(&mut self) -> Result<(), ProtocolError> {
        self.link.shutdown().await?;
        Ok(())
    }

    async fn exchange_packet(&mut self, packet: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        trace!(bytes = ?packet, "writing packet");
        self.link.write_all(packet).await?;
        self.link.flush().await?;
        self.read_reply().await
    }

    async fn read_reply(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = [0u8; READ_CHUNK];
        loop {
            let n = self.link.read(&mut buf).await?;
            if n == 0 {
                return Err(link_closed());
            }
            trace!(bytes = ?&buf[..n], "received");

            for (i, &byte) in buf[..n].iter().enumerate() {
                self.decoder.push(byte)?;
                if let Some(reply) = self.decoder.take_payload() {
                    let extra = n - i - 1;
                    if extra > 0 {
                        debug!(extra, "dropping bytes after reply");
                    }
                    return Ok(reply);
                }
            }
        }
    }

    /// Drop whatever the link has already buffered without waiting for more.
    ///
    /// A reply that arrives after its request timed out would otherwise be
    /// read as the reply to the next request.
    async fn discard_stale_input(&mut self) -> Result<(), ProtocolError> {
        let mut buf = [0u8; READ_CHUNK];
        let mut discarded = 0usize;
        loop {
            let mut read_buf = ReadBuf::new(&mut buf);
            let polled = poll_fn(|cx| match Pin::new(&mut self.link).poll_read(cx, &mut read_buf) {
                Poll::Ready(result) => Poll::Ready(Some(result)),
                Poll::Pending => Poll::Ready(None),
            })
            .await;

            match polled {
                None => break,
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(())) if read_buf.filled().is_empty() => return Err(link_closed()),
                Some(Ok(())) => discarded += read_buf.filled().len(),
            }
        }
        if discarded > 0 {
            warn!(discarded, "discarded stale bytes from link");
        }
        Ok(())
    }
}

fn link_closed() -> ProtocolError {
    ProtocolError::Link(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "link closed while awaiting reply",
    ))
}
