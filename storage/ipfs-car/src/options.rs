use std::path::PathBuf;

use glob::Pattern;
use ipld_core::cid::Version;
use tokio_util::sync::CancellationToken;

use crate::{
    chunker::Chunker, events::EventSink, hasher::CidBuilder, multicodec::SHA_256_CODE, Error,
};

/// The default chunk size, as defined in
/// [boxo](https://github.com/ipfs/boxo/blob/f4fe8997dcbeb39b3a4842d8f08b34739bfd84a4/chunker/parse.go#L13).
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 256;

/// Name of the default chunker.
pub const DEFAULT_CHUNKER: &str = "size-262144";

/// The default tree width, also called links per block, as defined in
/// [boxo](https://github.com/ipfs/boxo/blob/625ba769263c2beeec934836f54bbd6624db945a/ipld/unixfs/importer/helpers/helpers.go#L16-L30).
pub const DEFAULT_TREE_WIDTH: usize = 174;

/// Blocks up to this size are inlined into their CID when inlining is enabled.
pub const DEFAULT_INLINE_LIMIT: usize = 32;

/// Largest accepted chunk, the usual block size limit.
pub const MAX_CHUNK_SIZE: usize = 1024 * 1024;

/// DAG layout used for file content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Layout {
    /// Leaves are grouped under parents of `max_links` nodes,
    /// producing a tree where every leaf has the same depth.
    #[default]
    Balanced,
    /// Leaves are laid out in a trickle DAG, optimized for sequential reads.
    Trickle,
}

/// Import configuration.
///
/// Use struct update syntax to override the defaults:
///
/// ```
/// use ipfs_car::{ImportOptions, Layout};
///
/// let options = ImportOptions {
///     layout: Layout::Trickle,
///     inline: true,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub cid_version: Version,
    /// Multihash code used for every block, must be `sha2-256` under CIDv0.
    pub hash_code: u64,
    /// Store leaves as raw blocks.
    ///
    /// When unset, defaults to `true` for CIDv1 and `false` for CIDv0.
    /// CIDv0 never uses raw leaves.
    pub raw_leaves: Option<bool>,
    /// Inline blocks of up to `inline_limit` bytes into their CID.
    pub inline: bool,
    pub inline_limit: usize,
    /// Chunker name, see [`Chunker::parse`].
    pub chunker: String,
    pub layout: Layout,
    /// Maximum number of links per internal node.
    pub max_links: usize,
    /// Glob patterns of filesystem entries to skip.
    pub ignore_rules: Vec<String>,
    /// File with further ignore rules, one per line.
    pub ignore_file: Option<PathBuf>,
    pub include_hidden: bool,
    /// Receives an [`ImportEvent`](crate::ImportEvent) per committed file and directory.
    pub events: Option<EventSink>,
    pub cancellation: CancellationToken,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            cid_version: Version::V1,
            hash_code: SHA_256_CODE,
            raw_leaves: None,
            inline: false,
            inline_limit: DEFAULT_INLINE_LIMIT,
            chunker: DEFAULT_CHUNKER.to_string(),
            layout: Layout::default(),
            max_links: DEFAULT_TREE_WIDTH,
            ignore_rules: vec![],
            ignore_file: None,
            include_hidden: false,
            events: None,
            cancellation: CancellationToken::new(),
        }
    }
}

/// Options resolved by [`ImportOptions::validate`].
#[derive(Debug, Clone)]
pub(crate) struct Config {
    pub cid_builder: CidBuilder,
    pub raw_leaves: bool,
    pub chunker: Chunker,
    pub layout: Layout,
    pub max_links: usize,
    pub ignore: Vec<Pattern>,
}

impl ImportOptions {
    /// Check the options for consistency and resolve the defaults that depend on other fields.
    pub(crate) fn validate(&self) -> Result<Config, Error> {
        let mut cid_builder = CidBuilder::new(self.cid_version, self.hash_code)?;
        if self.inline {
            cid_builder = cid_builder.with_inline_limit(self.inline_limit)?;
        }

        let raw_leaves = match (self.cid_version, self.raw_leaves) {
            (Version::V0, Some(true)) => {
                tracing::warn!("raw leaves are not supported by CIDv0, disabling them");
                false
            }
            (Version::V0, _) => false,
            (Version::V1, raw_leaves) => raw_leaves.unwrap_or(true),
        };

        let chunker = Chunker::parse(&self.chunker)?;

        if self.max_links < 2 {
            return Err(Error::InvalidTreeWidth(self.max_links));
        }

        let ignore = self
            .ignore_rules
            .iter()
            .map(String::as_str)
            .map(Pattern::new)
            .collect::<Result<_, _>>()?;

        Ok(Config {
            cid_builder,
            raw_leaves,
            chunker,
            layout: self.layout,
            max_links: self.max_links,
            ignore,
        })
    }
}
