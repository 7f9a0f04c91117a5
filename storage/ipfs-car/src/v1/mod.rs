mod reader;
mod writer;

use futures::TryStreamExt;
use ipld_core::cid::Cid;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

pub use crate::v1::{reader::Reader, writer::Writer};
pub(crate) use crate::v1::{
    reader::{read_block, read_header},
    writer::{write_block, write_header},
};
use crate::{stores::BlockSource, traversal::walk, Error};

/// Low-level CARv1 header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// CAR file version.
    ///
    /// It is always 1, as defined in the
    /// [specification](https://ipld.io/specs/transport/car/carv1/#constraints).
    version: u8,

    /// Root [`Cid`](`ipld_core::cid::Cid`)s for the contained data.
    pub roots: Vec<Cid>,
}

impl Header {
    /// Construct a new [`CarV1Header`](`crate::v1::Header`).
    ///
    /// The version will always be 1, as defined in the
    /// [specification](https://ipld.io/specs/transport/car/carv1/#constraints).
    pub fn new(roots: Vec<Cid>) -> Self {
        Self { version: 1, roots }
    }

    pub fn version(&self) -> u8 {
        self.version
    }
}

/// Write the DAG rooted at `root` as a CARv1 stream.
///
/// The header carries `root` as its single root, it is followed by every reachable block,
/// depth-first, in link order, each one exactly once.
/// Blocks are written as they are visited.
///
/// Returns the number of bytes written.
#[tracing::instrument(skip_all, fields(%root))]
pub async fn write_car_v1<S, W>(
    source: &S,
    root: Cid,
    writer: &mut W,
    cancellation: CancellationToken,
) -> Result<usize, Error>
where
    S: BlockSource + ?Sized,
    W: AsyncWrite + Unpin,
{
    let mut written = write_header(writer, &Header::new(vec![root])).await?;

    let blocks = walk(source, root, cancellation);
    tokio::pin!(blocks);
    let mut count = 0;
    while let Some((cid, block)) = blocks.try_next().await? {
        written += write_block(writer, &cid, &block).await?;
        count += 1;
    }
    writer.flush().await?;

    tracing::debug!(blocks = count, bytes = written, "wrote CARv1");
    Ok(written)
}
