use async_stream::try_stream;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use ipld_core::cid::Cid;

use super::{EncodedNode, LeafFormat, LinkInfo, TreeNode};
use crate::{hasher::CidBuilder, Error};

/// Number of subtrees added per depth level, as defined in
/// [boxo](https://github.com/ipfs/boxo/blob/f4fe8997dcbeb39b3a4842d8f08b34739bfd84a4/ipld/unixfs/importer/trickle/trickledag.go#L33).
const LAYER_REPEAT: usize = 4;

/// Node under construction.
struct Frame {
    links: Vec<(Cid, LinkInfo)>,
    /// Subtrees of this node must be shallower than this, the root is unbounded.
    max_depth: Option<usize>,
    /// Depth of the subtrees currently being added.
    depth: usize,
    /// Subtrees added at the current depth.
    repeats: usize,
    /// Whether the direct leaves were already added.
    filled: bool,
}

impl Frame {
    fn new(max_depth: Option<usize>) -> Self {
        Self {
            links: vec![],
            max_depth,
            depth: 1,
            repeats: 0,
            filled: false,
        }
    }

    fn can_descend(&self) -> bool {
        self.max_depth.map_or(true, |max_depth| self.depth < max_depth)
    }
}

/// Take a stream of chunks and return a stream of encoded nodes laid out as a trickle DAG.
///
/// Every node first takes up to `width` leaves, then [`LAYER_REPEAT`] subtrees of depth 1,
/// [`LAYER_REPEAT`] subtrees of depth 2 and so on, until the input runs out
/// (or, for subtrees, their own depth is reached).
/// The recursion is driven by an explicit stack of [`Frame`]s.
///
/// Unlike the balanced layout, the root is always a stem, even for empty or single chunk inputs.
pub(crate) fn stream_trickle_tree<I>(
    input: I,
    width: usize,
    builder: CidBuilder,
    leaf_format: LeafFormat,
) -> impl Stream<Item = Result<EncodedNode, Error>>
where
    I: Stream<Item = Result<Bytes, Error>> + Send,
{
    try_stream! {
        let input = input
            .map(|data| data.and_then(|data| TreeNode::Leaf(data, leaf_format).encode(&builder)))
            .peekable();
        tokio::pin!(input);

        let mut stack = vec![Frame::new(None)];
        while let Some(frame) = stack.last_mut() {
            if !frame.filled {
                while frame.links.len() < width {
                    let Some(leaf) = input.next().await else {
                        break;
                    };
                    let leaf = leaf?;
                    frame.links.push((leaf.cid, leaf.link));
                    yield leaf;
                }
                frame.filled = true;
            }

            let exhausted = input.as_mut().peek().await.is_none();
            if !exhausted && frame.can_descend() {
                if frame.repeats < LAYER_REPEAT {
                    frame.repeats += 1;
                    let depth = frame.depth;
                    stack.push(Frame::new(Some(depth)));
                } else {
                    frame.depth += 1;
                    frame.repeats = 0;
                }
                continue;
            }

            let Some(done) = stack.pop() else {
                break;
            };
            let stem = TreeNode::Stem(done.links).encode(&builder)?;
            if let Some(parent) = stack.last_mut() {
                parent.links.push((stem.cid, stem.link));
            }
            yield stem;
        }
    }
}
