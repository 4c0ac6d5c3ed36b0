//! Exact-read and framed-write primitives.
//!
//! Everything that touches the transport goes through these functions. A
//! read either delivers every requested byte or fails; it never hands back a
//! partially filled buffer.

use std::io;

use bytes::BytesMut;
use mysql_protocol::{MAX_PAYLOAD_LEN, PACKET_HEADER_SIZE, PacketHeader};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::CodecError;

/// Fill `buf` completely, looping over partial reads.
///
/// The write offset advances by exactly the number of bytes each read
/// returned. End of stream before the buffer is full is an
/// [`io::ErrorKind::UnexpectedEof`] error.
pub async fn read_exact_into<R>(reader: &mut R, buf: &mut [u8]) -> io::Result<()>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("stream ended after {filled} of {} bytes", buf.len()),
            ));
        }
        filled += n;
    }
    Ok(())
}

/// Read exactly `n` bytes into a new buffer.
pub async fn read_exact<R>(reader: &mut R, n: usize) -> io::Result<BytesMut>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = BytesMut::zeroed(n);
    read_exact_into(reader, &mut buf).await?;
    Ok(buf)
}

/// Read one packet header.
///
/// A stream that ends before the first header byte yields
/// [`CodecError::ConnectionClosed`]; one that ends inside the header is an
/// I/O error.
pub async fn read_header<R>(reader: &mut R) -> Result<PacketHeader, CodecError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut bytes = [0u8; PACKET_HEADER_SIZE];
    let first = reader.read(&mut bytes).await?;
    if first == 0 {
        return Err(CodecError::ConnectionClosed);
    }
    read_exact_into(reader, &mut bytes[first..]).await?;

    let header = PacketHeader::from_bytes(bytes);
    tracing::trace!(
        length = header.length,
        sequence = header.sequence,
        "read packet header"
    );
    Ok(header)
}

/// Write a single frame.
///
/// Fails with [`mysql_protocol::ProtocolError::PacketTooLarge`] if `payload`
/// does not fit one frame.
pub async fn write_frame<W>(writer: &mut W, sequence: u8, payload: &[u8]) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let header = PacketHeader::new(payload.len(), sequence)?;
    writer.write_all(&header.to_bytes()).await?;
    writer.write_all(payload).await?;

    tracing::trace!(length = payload.len(), sequence, "wrote packet");
    Ok(())
}

/// Write a complete message starting at `sequence`.
///
/// Payloads of `MAX_PAYLOAD_LEN` bytes or more are split into full frames
/// followed by a shorter final frame, which is empty when the payload is an
/// exact multiple of the frame size. Returns the next sequence number.
///
/// The writer is not flushed.
pub async fn write_packet<W>(writer: &mut W, sequence: u8, payload: &[u8]) -> Result<u8, CodecError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut sequence = sequence;
    for chunk in payload.chunks(MAX_PAYLOAD_LEN) {
        write_frame(writer, sequence, chunk).await?;
        sequence = sequence.wrapping_add(1);
    }
    if payload.len() % MAX_PAYLOAD_LEN == 0 {
        write_frame(writer, sequence, &[]).await?;
        sequence = sequence.wrapping_add(1);
    }
    Ok(sequence)
}
