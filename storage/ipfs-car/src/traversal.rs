//! De-duplicated depth-first traversal of a DAG.
//!
//! Blocks are yielded in pre-order, children in link order,
//! which is the order in which CAR payloads are written.

use std::collections::HashSet;

use async_stream::try_stream;
use bytes::Bytes;
use futures::Stream;
use ipld_core::{cid::Cid, codec::Codec, ipld::Ipld};
use ipld_dagpb::{DagPbCodec, PbNode};
use serde_ipld_dagcbor::codec::DagCborCodec;
use tokio_util::sync::CancellationToken;

use crate::{
    multicodec::{DAG_CBOR_CODE, DAG_PB_CODE, IDENTITY_CODE, RAW_CODE},
    stores::BlockSource,
    Error,
};

/// Walk the DAG rooted at `root`, yielding every reachable block exactly once.
///
/// Fails with [`Error::MissingBlock`] as soon as a reachable block is not available
/// and with [`Error::Cancelled`] if `cancellation` fires between blocks.
pub fn walk<'a, S>(
    source: &'a S,
    root: Cid,
    cancellation: CancellationToken,
) -> impl Stream<Item = Result<(Cid, Bytes), Error>> + Send + 'a
where
    S: BlockSource + ?Sized,
{
    try_stream! {
        let mut visited = HashSet::new();
        let mut stack = vec![root];

        while let Some(cid) = stack.pop() {
            if cancellation.is_cancelled() {
                Err(Error::Cancelled)?;
            }
            if !visited.insert(cid) {
                continue;
            }

            let block = source
                .get_block(&cid)
                .await?
                .ok_or(Error::MissingBlock(cid))?;
            let mut links = links(&cid, &block)?;
            links.reverse();
            stack.extend(links);

            tracing::trace!(%cid, len = block.len(), "visiting block");
            yield (cid, block);
        }
    }
}

/// Extract the links of `block`, in order.
pub(crate) fn links(cid: &Cid, block: &[u8]) -> Result<Vec<Cid>, Error> {
    // Identity CIDs carry their own block, the codec still decides the links
    let codec = cid.codec();
    match codec {
        RAW_CODE => Ok(vec![]),
        DAG_PB_CODE => {
            let node: PbNode = DagPbCodec::decode_from_slice(block)?;
            Ok(node.links.into_iter().map(|link| link.cid).collect())
        }
        DAG_CBOR_CODE => {
            let node: Ipld = DagCborCodec::decode_from_slice(block)?;
            let mut links = vec![];
            collect_links(&node, &mut links);
            Ok(links)
        }
        IDENTITY_CODE => Ok(vec![]),
        other => Err(Error::UnsupportedCodec(other)),
    }
}

fn collect_links(node: &Ipld, links: &mut Vec<Cid>) {
    match node {
        Ipld::Link(cid) => links.push(*cid),
        Ipld::List(items) => items.iter().for_each(|item| collect_links(item, links)),
        Ipld::Map(entries) => {
            // DAG-CBOR orders map keys by length first, then bytewise
            let mut entries: Vec<_> = entries.iter().collect();
            entries.sort_by(|(a, _), (b, _)| {
                (a.len(), a.as_bytes()).cmp(&(b.len(), b.as_bytes()))
            });
            entries
                .into_iter()
                .for_each(|(_, value)| collect_links(value, links));
        }
        _ => {}
    }
}
