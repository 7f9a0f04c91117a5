use bytes::Bytes;
use ipld_core::cid::Cid;

use super::{Blockstore, Exchange, NoopExchange};
use crate::Error;

/// A [`Blockstore`] backed by an [`Exchange`].
///
/// New blocks are announced to the exchange,
/// blocks missing from the store are requested from it.
pub struct BlockService {
    store: Blockstore,
    exchange: Box<dyn Exchange>,
}

impl BlockService {
    pub fn new(store: Blockstore, exchange: Box<dyn Exchange>) -> Self {
        Self { store, exchange }
    }

    /// A service that only ever serves local blocks.
    pub fn offline() -> Self {
        Self::new(Blockstore::new(), Box::new(NoopExchange))
    }

    /// Store a block, announcing it if it was not present yet.
    pub async fn put(&mut self, cid: Cid, data: Bytes) -> Result<(), Error> {
        if self.store.put(cid, data.clone()) {
            self.exchange.notify_new_blocks(&[(cid, data)]).await?;
        }
        Ok(())
    }

    pub async fn get(&self, cid: &Cid) -> Result<Bytes, Error> {
        match self.store.get(cid) {
            Some(block) => Ok(block),
            None => self.exchange.get_block(cid).await,
        }
    }

    pub fn blockstore(&self) -> &Blockstore {
        &self.store
    }
}

impl Default for BlockService {
    fn default() -> Self {
        Self::offline()
    }
}

impl std::fmt::Debug for BlockService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockService")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
