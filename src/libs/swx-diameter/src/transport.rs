//! TCP framing for Diameter (RFC 6733 §2.1)
//!
//! Messages are delimited by the 24-bit length in header bytes 1..4. A
//! [`DiameterTransport`] carries the capabilities exchange and is then split:
//! the [`DiameterReader`] goes to the receive task, the [`DiameterWriter`] is
//! shared behind a lock by every sender.

use bytes::{Buf, Bytes, BytesMut};
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

use crate::error::{DiameterError, DiameterResult};
use crate::message::{DiameterMessage, DIAMETER_HEADER_SIZE};

/// Largest frame accepted from a peer.
const MAX_MESSAGE_SIZE: usize = 64 * 1024;

const INITIAL_READ_CAPACITY: usize = 4096;

/// Cut one complete frame off the front of `buf`, if one has arrived.
///
/// Only the length field is checked here. A frame whose body fails to decode
/// still leaves the stream in sync.
fn try_split_frame(buf: &mut BytesMut) -> DiameterResult<Option<Bytes>> {
    let Some(mut header) = buf.get(..DIAMETER_HEADER_SIZE) else {
        return Ok(None);
    };
    header.advance(1);
    let frame_len = header.get_uint(3) as usize;

    if !(DIAMETER_HEADER_SIZE..=MAX_MESSAGE_SIZE).contains(&frame_len) {
        return Err(DiameterError::InvalidMessage(format!(
            "frame length {frame_len} outside {DIAMETER_HEADER_SIZE}..={MAX_MESSAGE_SIZE}"
        )));
    }
    if buf.len() < frame_len {
        return Ok(None);
    }

    Ok(Some(buf.split_to(frame_len).freeze()))
}

async fn read_frame<R>(stream: &mut R, buf: &mut BytesMut) -> DiameterResult<Bytes>
where
    R: AsyncRead + Unpin,
{
    loop {
        if let Some(frame) = try_split_frame(buf)? {
            return Ok(frame);
        }
        if stream.read_buf(buf).await? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "peer closed the connection").into());
        }
    }
}

async fn read_message<R>(stream: &mut R, buf: &mut BytesMut) -> DiameterResult<DiameterMessage>
where
    R: AsyncRead + Unpin,
{
    let mut frame = read_frame(stream, buf).await?;
    DiameterMessage::decode(&mut frame)
}

async fn write_message<W>(stream: &mut W, msg: &DiameterMessage) -> DiameterResult<()>
where
    W: AsyncWrite + Unpin,
{
    stream.write_all(&msg.encode()).await?;
    stream.flush().await?;
    Ok(())
}

/// Framed Diameter connection over one TCP stream
pub struct DiameterTransport {
    stream: TcpStream,
    read_buf: BytesMut,
    peer_addr: SocketAddr,
    local_addr: SocketAddr,
}

impl DiameterTransport {
    pub fn new(stream: TcpStream) -> DiameterResult<Self> {
        stream.set_nodelay(true)?;
        Ok(Self {
            peer_addr: stream.peer_addr()?,
            local_addr: stream.local_addr()?,
            read_buf: BytesMut::with_capacity(INITIAL_READ_CAPACITY),
            stream,
        })
    }

    /// Open a TCP connection to `addr` (host:port).
    pub async fn connect(addr: &str) -> DiameterResult<Self> {
        Self::new(TcpStream::connect(addr).await?)
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn send(&mut self, msg: &DiameterMessage) -> DiameterResult<()> {
        write_message(&mut self.stream, msg).await
    }

    pub async fn recv(&mut self) -> DiameterResult<DiameterMessage> {
        read_message(&mut self.stream, &mut self.read_buf).await
    }

    /// Split into owned halves. Anything already buffered by
    /// [`recv`](Self::recv) stays with the reader.
    pub fn into_split(self) -> (DiameterReader, DiameterWriter) {
        let Self { stream, read_buf, peer_addr, .. } = self;
        let (rx, tx) = stream.into_split();
        (
            DiameterReader { stream: rx, read_buf, peer_addr },
            DiameterWriter { stream: tx, peer_addr },
        )
    }

    pub async fn shutdown(&mut self) -> DiameterResult<()> {
        Ok(self.stream.shutdown().await?)
    }
}

/// Read side of a split [`DiameterTransport`]
pub struct DiameterReader {
    stream: OwnedReadHalf,
    read_buf: BytesMut,
    peer_addr: SocketAddr,
}

impl DiameterReader {
    pub async fn recv(&mut self) -> DiameterResult<DiameterMessage> {
        read_message(&mut self.stream, &mut self.read_buf).await
    }

    /// Next raw frame, undecoded. An error here means the stream is unusable
    /// (I/O failure, EOF or a bad length field).
    pub async fn recv_frame(&mut self) -> DiameterResult<Bytes> {
        read_frame(&mut self.stream, &mut self.read_buf).await
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

/// Write side of a split [`DiameterTransport`]
pub struct DiameterWriter {
    stream: OwnedWriteHalf,
    peer_addr: SocketAddr,
}

impl DiameterWriter {
    pub async fn send(&mut self, msg: &DiameterMessage) -> DiameterResult<()> {
        write_message(&mut self.stream, msg).await
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Half-close: no more writes, reads on the peer see EOF.
    pub async fn shutdown(&mut self) -> DiameterResult<()> {
        Ok(self.stream.shutdown().await?)
    }
}

/// Accepts inbound Diameter connections. Used by test peers standing in for
/// the HSS.
pub struct DiameterListener {
    listener: TcpListener,
}

impl DiameterListener {
    pub async fn bind(addr: SocketAddr) -> DiameterResult<Self> {
        Ok(Self {
            listener: TcpListener::bind(addr).await?,
        })
    }

    pub async fn accept(&self) -> DiameterResult<DiameterTransport> {
        let (stream, _) = self.listener.accept().await?;
        DiameterTransport::new(stream)
    }

    pub fn local_addr(&self) -> DiameterResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}
