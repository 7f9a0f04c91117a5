use std::str::FromStr;

use bytes::{Bytes, BytesMut};
use futures::Stream;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;

use crate::{
    options::{DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE},
    Error,
};

/// Fixed-size chunking strategy.
///
/// Accepts the same names as [boxo](https://github.com/ipfs/boxo/blob/f4fe8997dcbeb39b3a4842d8f08b34739bfd84a4/chunker/parse.go),
/// restricted to the size splitter: `default` and `size-N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    size: usize,
}

impl Chunker {
    /// Create a fixed-size chunker, `size` must be within `1..=MAX_CHUNK_SIZE`.
    pub fn fixed(size: usize) -> Result<Self, Error> {
        if size == 0 || size > MAX_CHUNK_SIZE {
            return Err(Error::InvalidChunker(format!("size-{size}")));
        }
        Ok(Self { size })
    }

    /// Parse a chunker name.
    pub fn parse(name: &str) -> Result<Self, Error> {
        if name == "default" {
            return Ok(Self::default());
        }

        let size = name
            .strip_prefix("size-")
            .and_then(|size| size.parse::<usize>().ok())
            .ok_or_else(|| Error::InvalidChunker(name.to_string()))?;

        Self::fixed(size).map_err(|_| Error::InvalidChunker(name.to_string()))
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Split `source` into chunks of exactly [`Chunker::size`] bytes, except for the last one.
    ///
    /// Empty sources produce no chunks.
    pub(crate) fn stream<R>(
        self,
        mut source: R,
        cancellation: CancellationToken,
    ) -> impl Stream<Item = Result<Bytes, Error>>
    where
        R: AsyncRead + Unpin,
    {
        let chunk_size = self.size;
        // `tokio_util::io::ReaderStream` yields whatever a single read returns,
        // chunks need to be filled before being handed off
        async_stream::try_stream! {
            let mut buf = BytesMut::with_capacity(chunk_size);

            loop {
                if buf.len() >= chunk_size {
                    yield buf.split_to(chunk_size).freeze();
                    continue;
                }
                buf.reserve(chunk_size - buf.len());

                let read: Result<usize, Error> = tokio::select! {
                    biased;
                    _ = cancellation.cancelled() => Err(Error::Cancelled),
                    read = source.read_buf(&mut buf) => read.map_err(Error::from),
                };

                if read? == 0 {
                    if !buf.is_empty() {
                        yield buf.split().freeze();
                    }
                    break;
                }
            }
        }
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl FromStr for Chunker {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
