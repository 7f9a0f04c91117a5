mod blockservice;
mod blockstore;
mod exchange;

use async_trait::async_trait;
pub use blockservice::BlockService;
pub use blockstore::Blockstore;
use bytes::Bytes;
pub use exchange::{Exchange, NoopExchange};
use ipld_core::cid::Cid;

use crate::Error;

/// Read access to blocks, used by the DAG traversal.
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Fetch the block for `cid`, returning `None` if it is not available.
    async fn get_block(&self, cid: &Cid) -> Result<Option<Bytes>, Error>;
}

#[async_trait]
impl BlockSource for Blockstore {
    async fn get_block(&self, cid: &Cid) -> Result<Option<Bytes>, Error> {
        Ok(self.get(cid))
    }
}

#[async_trait]
impl BlockSource for BlockService {
    async fn get_block(&self, cid: &Cid) -> Result<Option<Bytes>, Error> {
        match self.get(cid).await {
            Ok(block) => Ok(Some(block)),
            Err(Error::BlockNotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }
}
