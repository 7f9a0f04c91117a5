use async_trait::async_trait;
use bytes::Bytes;
use ipld_core::cid::Cid;

use crate::Error;

/// Network block exchange, used by [`BlockService`](super::BlockService)
/// to fetch blocks missing from the local store and to announce new ones.
#[async_trait]
pub trait Exchange: Send + Sync {
    async fn get_block(&self, cid: &Cid) -> Result<Bytes, Error>;

    async fn get_blocks(&self, cids: &[Cid]) -> Result<Vec<(Cid, Bytes)>, Error>;

    /// Announce blocks that were just added to the local store.
    async fn notify_new_blocks(&self, blocks: &[(Cid, Bytes)]) -> Result<(), Error>;
}

/// An [`Exchange`] that is never able to provide blocks and ignores announcements.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopExchange;

#[async_trait]
impl Exchange for NoopExchange {
    async fn get_block(&self, cid: &Cid) -> Result<Bytes, Error> {
        Err(Error::BlockNotFound(*cid))
    }

    async fn get_blocks(&self, cids: &[Cid]) -> Result<Vec<(Cid, Bytes)>, Error> {
        match cids.first() {
            Some(cid) => Err(Error::BlockNotFound(*cid)),
            None => Ok(vec![]),
        }
    }

    async fn notify_new_blocks(&self, _blocks: &[(Cid, Bytes)]) -> Result<(), Error> {
        Ok(())
    }
}
