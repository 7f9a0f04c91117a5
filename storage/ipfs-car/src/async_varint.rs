//! Async unsigned varint helpers for CAR frames and headers.
//!
//! `integer-encoding`'s own tokio helpers produce futures that are not `Send`,
//! which would leak into every encoder built on top of them, so the decoding
//! loop lives here and only the pure encode/decode functions are borrowed.
use std::{io, mem::size_of};

use integer_encoding::VarInt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Most-significant byte, == 0x80
const MSB: u8 = 0b1000_0000;

/// Write `n` as an unsigned varint, returning the number of bytes written.
pub(crate) async fn write_varint<W, VI>(writer: &mut W, n: VI) -> Result<usize, io::Error>
where
    W: AsyncWrite + Unpin,
    VI: VarInt,
{
    let mut buf = [0u8; 10];
    let written = n.encode_var(&mut buf);
    writer.write_all(&buf[..written]).await?;
    Ok(written)
}

/// Read a single unsigned varint.
///
/// EOF before the first byte, or in the middle of a varint,
/// is reported as [`io::ErrorKind::UnexpectedEof`].
pub(crate) async fn read_varint<R, VI>(reader: &mut R) -> Result<VI, io::Error>
where
    R: AsyncRead + Unpin,
    VI: VarInt,
{
    let max_size = (size_of::<VI>() * 8 + 7) / 7;
    let mut buf = [0u8; 10];
    let mut read = 0;

    loop {
        if read >= max_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "unterminated varint",
            ));
        }
        buf[read] = reader.read_u8().await?;
        read += 1;
        if buf[read - 1] & MSB == 0 {
            break;
        }
    }

    VI::decode_var(&buf[..read])
        .map(|(value, _)| value)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "invalid varint"))
}
