//! Import bytes, readers and filesystem trees into a UnixFS Merkle DAG and
//! package the result as a [CARv1](https://ipld.io/specs/transport/car/carv1/)
//! or [CARv2](https://ipld.io/specs/transport/car/carv2/) archive.
//!
//! ```no_run
//! # async fn run() -> Result<(), ipfs_car::Error> {
//! use ipfs_car::{Builder, ImportOptions, Input};
//!
//! let mut builder = Builder::new();
//! let car = builder
//!     .build_v2(Input::from("./data"), ImportOptions::default())
//!     .await?;
//! let mut output = vec![];
//! car.write(&mut output).await?;
//! println!("{} ({} bytes)", car.root(), output.len());
//! # Ok(())
//! # }
//! ```

mod async_varint;
mod builder;
mod chunker;
mod events;
mod fs;
mod hasher;
mod importer;
pub mod multicodec;
mod options;
mod stores;
mod traversal;
mod unixfs;
mod v1;
mod v2;

pub use builder::{Builder, CarV1, CarV2};
pub use chunker::Chunker;
pub use events::{human_size, EventSink, ImportEvent};
pub use fs::{Filter, FsNode, FsNodeKind};
pub use hasher::{assign, CidBuilder};
pub use importer::{Importer, Input};
pub use ipld_core::cid::{Cid, Version};
pub use options::{
    ImportOptions, Layout, DEFAULT_CHUNKER, DEFAULT_CHUNK_SIZE, DEFAULT_INLINE_LIMIT,
    DEFAULT_TREE_WIDTH, MAX_CHUNK_SIZE,
};
pub use stores::{BlockService, BlockSource, Blockstore, Exchange, NoopExchange};
pub use traversal::walk;
pub use v1::{
    write_car_v1, Header as CarV1Header, Reader as CarV1Reader, Writer as CarV1Writer,
};
pub use v2::{
    write_car_v2, Characteristics, Header as CarV2Header, Index, IndexEntry, MultiWidthIndex,
    MultihashIndexSorted, Reader as CarV2Reader, SingleWidthIndex, Writer as CarV2Writer,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    CodecError(#[from] serde_ipld_dagcbor::error::CodecError),

    #[error(transparent)]
    DagPbError(#[from] ipld_dagpb::Error),

    #[error(transparent)]
    ProtobufError(#[from] quick_protobuf::Error),

    #[error(transparent)]
    IoError(#[from] tokio::io::Error),

    #[error(transparent)]
    CidError(#[from] ipld_core::cid::Error),

    #[error(transparent)]
    MultihashError(#[from] ipld_core::cid::multihash::Error),

    #[error(transparent)]
    WalkError(#[from] walkdir::Error),

    #[error(transparent)]
    PatternError(#[from] glob::PatternError),

    #[error(transparent)]
    JoinError(#[from] tokio::task::JoinError),

    /// The requested multihash code is not part of the supported code table.
    #[error("invalid multihash type {0:#x}")]
    InvalidHashType(u64),

    /// CIDv0 is hard-wired to sha2-256, any other hash requires CIDv1.
    #[error("incompatible CID version, CIDv0 only supports sha2-256")]
    IncompatibleCidVersion,

    #[error("invalid chunker: {0}")]
    InvalidChunker(String),

    /// Internal nodes need room for at least two links.
    #[error("invalid tree width {0}, nodes must have at least 2 links")]
    InvalidTreeWidth(usize),

    /// Identity multihashes cannot hold more than 64 bytes.
    #[error("inline limit {0} exceeds the maximum identity digest size")]
    InvalidInlineLimit(usize),

    /// A block referenced by the DAG is not present in the store.
    #[error("block {0} is missing from the store")]
    MissingBlock(Cid),

    /// Returned by [`Exchange`] implementations that cannot provide a block.
    #[error("block {0} not found in exchange")]
    BlockNotFound(Cid),

    #[error("unsupported codec {0:#x}, cannot extract links")]
    UnsupportedCodec(u64),

    /// The operation was aborted through its cancellation token.
    #[error("operation cancelled")]
    Cancelled,

    #[error(
        "invalid version, expected version {expected}, but received version {received} instead"
    )]
    VersionMismatchError { expected: u8, received: u8 },

    /// According to the [specification](https://ipld.io/specs/transport/car/carv1/#constraints)
    /// CAR files MUST have **one or more** CID roots.
    #[error("CAR file must have roots")]
    EmptyRootsError,

    /// Unknown type of index. Supported indexes are
    /// [`MultiWidthIndex`](`crate::v2::MultiWidthIndex`) and
    /// [`MultihashIndexSorted`](`crate::v2::MultihashIndexSorted`).
    #[error("unknown index type {0}")]
    UnknownIndexError(u64),

    /// Digest does not match the expected length.
    #[error("digest has length {received}, instead of {expected}")]
    NonMatchingDigestError { expected: usize, received: usize },

    /// Cannot know width or count from an empty vector.
    #[error("cannot create an index out of an empty `Vec`")]
    EmptyIndexError,

    #[error("unknown characteristics were set: {0}")]
    UnknownCharacteristicsError(u128),

    #[error("invalid CARv2 pragma: {0:02x?}")]
    InvalidPragmaError(Vec<u8>),
}

impl Error {
    /// Whether this error is the result of a cancellation request
    /// rather than an actual failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

// NOTE(@jmg-duarte,23/05/2024): I'm looking for better alternatives to this
#[cfg(test)]
pub(crate) mod test_utils {
    /// Check if two given slices are equal.
    ///
    /// First checks if the two slices have the same size,
    /// then checks each byte-pair. If the slices differ,
    /// it will show an error message with the difference index
    /// along with a window showing surrounding elements
    /// (instead of spamming your terminal like `assert_eq!` does).
    macro_rules! assert_buffer_eq {
        ($lhs:expr, $rhs:expr) => {{
            let lhs: &[u8] = $lhs;
            let rhs: &[u8] = $rhs;
            assert_eq!(lhs.len(), rhs.len(), "buffers have different lengths");
            for (i, (l, r)) in lhs.iter().zip(rhs).enumerate() {
                let before = i.saturating_sub(5);
                let after = (i + 5).min(rhs.len() - 1);
                assert_eq!(
                    l,
                    r,
                    "difference at index {}\n  left: {:02x?}\n right: {:02x?}",
                    i,
                    &lhs[before..=after],
                    &rhs[before..=after],
                )
            }
        }};
    }

    pub(crate) use assert_buffer_eq;

    /// Deterministic, non-repeating (within 251 bytes) test content.
    pub(crate) fn patterned_bytes(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }
}
