mod index;
mod reader;
mod writer;

use std::collections::BTreeMap;

use bitflags::bitflags;
use futures::TryStreamExt;
pub use index::{Index, IndexEntry, MultiWidthIndex, MultihashIndexSorted, SingleWidthIndex};
use ipld_core::cid::Cid;
pub use reader::Reader;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
pub use writer::Writer;

use crate::{hasher::is_inlined, stores::BlockSource, traversal::walk, Error};

/// The pragma for a CARv2. This is also a valid CARv1 header, with version 2 and no root CIDs.
///
/// For more information, check the specification: <https://ipld.io/specs/transport/car/carv2/#pragma>
pub const PRAGMA: [u8; 11] = [
    0x0a, // unit(10)
    0xa1, // map(1)
    0x67, // string(7)
    0x76, 0x65, 0x72, 0x73, 0x69, 0x6f, 0x6e, // "version"
    0x02, // uint(2)
];

bitflags! {
    /// Characteristics of the enclosed data.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Characteristics: u128 {
        const EMPTY = 0;
        const FULLY_INDEXED = 1 << 127;
    }
}

impl Characteristics {
    /// Create a new [`Characteristics`].
    pub fn new(fully_indexed: bool) -> Self {
        if fully_indexed {
            Self::FULLY_INDEXED
        } else {
            Self::EMPTY
        }
    }

    /// Check whether the `fully-indexed` characteristic is set.
    #[inline]
    pub const fn is_fully_indexed(&self) -> bool {
        self.intersects(Self::FULLY_INDEXED)
    }
}

impl Default for Characteristics {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Low-level CARv2 header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Describes certain features of the enclosed data.
    pub characteristics: Characteristics,
    /// Byte-offset from the beginning of the CARv2 pragma to the first byte of the CARv1 data payload.
    pub data_offset: u64,
    /// Byte-length of the CARv1 data payload.
    pub data_size: u64,
    /// Byte-offset from the beginning of the CARv2 pragma to the first byte of the index payload.
    /// This value may be 0 to indicate the absence of index data.
    pub index_offset: u64,
}

impl Header {
    /// The [`Header`] size in bytes (includes the pragma).
    ///
    /// As defined in the [specification](https://ipld.io/specs/transport/car/carv2/#header).
    pub const SIZE: usize = PRAGMA.len() + 40;

    /// Construct a new [`Header`].
    pub fn new(fully_indexed: bool, data_offset: u64, data_size: u64, index_offset: u64) -> Self {
        Self {
            characteristics: Characteristics::new(fully_indexed),
            data_offset,
            data_size,
            index_offset,
        }
    }
}

/// Write the DAG rooted at `root` as a CARv2 file.
///
/// The inner CARv1 payload is exactly what [`write_car_v1`](crate::write_car_v1) produces
/// for the same arguments. It is followed by a [`MultihashIndexSorted`] index
/// over every frame, except for inlined (identity) blocks, which are written but not indexed.
///
/// Returns the number of bytes written.
#[tracing::instrument(skip_all, fields(%root))]
pub async fn write_car_v2<S, W>(
    source: &S,
    root: Cid,
    writer: &mut W,
    cancellation: CancellationToken,
) -> Result<usize, Error>
where
    S: BlockSource + ?Sized,
    W: AsyncWrite + Unpin,
{
    // The header needs the payload size, so the payload is assembled first
    let mut payload = vec![];
    crate::v1::write_header(&mut payload, &crate::v1::Header::new(vec![root])).await?;

    // multihash code -> digest width -> entries
    let mut entries: BTreeMap<u64, BTreeMap<usize, Vec<IndexEntry>>> = BTreeMap::new();
    let blocks = walk(source, root, cancellation);
    tokio::pin!(blocks);
    while let Some((cid, block)) = blocks.try_next().await? {
        let offset = payload.len() as u64;
        crate::v1::write_block(&mut payload, &cid, &block).await?;
        if is_inlined(&cid) {
            continue;
        }
        let multihash = cid.hash();
        entries
            .entry(multihash.code())
            .or_default()
            .entry(multihash.digest().len())
            .or_default()
            .push(IndexEntry::new(multihash.digest().to_vec(), offset));
    }

    let mut index = BTreeMap::new();
    for (code, widths) in entries {
        let buckets = widths
            .into_values()
            .map(SingleWidthIndex::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        index.insert(code, MultiWidthIndex::from(buckets));
    }
    let index = Index::multihash(index);

    let data_offset = Header::SIZE as u64;
    let data_size = payload.len() as u64;
    let header = Header::new(false, data_offset, data_size, data_offset + data_size);

    let mut writer = Writer::new(writer);
    let mut written = writer.write_header(&header).await?;
    writer.get_inner_mut().write_all(&payload).await?;
    written += payload.len();
    written += writer.write_index(&index).await?;
    writer.finish().await?;

    tracing::debug!(data_size, bytes = written, "wrote CARv2");
    Ok(written)
}
