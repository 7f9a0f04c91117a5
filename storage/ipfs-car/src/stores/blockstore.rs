use bytes::Bytes;
use indexmap::IndexMap;
use ipld_core::cid::Cid;

use crate::hasher::is_inlined;

/// The [`Blockstore`] stores pairs of [`Cid`] and [`Bytes`] in memory.
///
/// The store keeps track of ([`Cid`], [`Bytes`]) pairs in insertion order,
/// performing de-duplication based on the [`Cid`].
/// Blocks inlined into identity [`Cid`]s are never stored,
/// they are recovered from the [`Cid`] itself when requested.
#[derive(Debug, Default, Clone)]
pub struct Blockstore {
    blocks: IndexMap<Cid, Bytes>,
}

impl Blockstore {
    /// Construct a new, empty, [`Blockstore`].
    pub fn new() -> Self {
        Default::default()
    }

    /// Insert a new block into the [`Blockstore`].
    ///
    /// Returns `false` if the block was previously inserted or is inlined, in which case this is a no-op.
    pub fn put(&mut self, cid: Cid, data: Bytes) -> bool {
        if is_inlined(&cid) || self.blocks.contains_key(&cid) {
            return false;
        }
        tracing::trace!(%cid, len = data.len(), "storing block");
        self.blocks.insert(cid, data);
        true
    }

    pub fn get(&self, cid: &Cid) -> Option<Bytes> {
        if is_inlined(cid) {
            return Some(Bytes::copy_from_slice(cid.hash().digest()));
        }
        self.blocks.get(cid).cloned()
    }

    pub fn has(&self, cid: &Cid) -> bool {
        is_inlined(cid) || self.blocks.contains_key(cid)
    }

    /// Number of stored blocks, inlined blocks are not accounted for.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Iterate over the stored blocks, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Cid, &Bytes)> {
        self.blocks.iter()
    }
}
