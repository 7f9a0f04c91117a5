//! The original implementation of this module is located at
//! <https://github.com/n0-computer/beetle/blob/3e137cb2bc18e1d458c3f72d5e817b03d9537d5d/iroh-unixfs/src/balanced_tree.rs>.

use std::collections::VecDeque;

use async_stream::try_stream;
use bytes::Bytes;
use ipld_core::cid::Cid;
use tokio_stream::{Stream, StreamExt};

use super::{EncodedNode, LeafFormat, LinkInfo, TreeNode};
use crate::{hasher::CidBuilder, Error};

/// Take a stream of chunks and return a stream of encoded nodes laid out as a balanced tree.
///
/// Leaves are accumulated `width` at a time and stems are built lazily,
/// the tree grows upwards and completed levels are dropped as soon as their stem is built.
/// Every node is yielded before its parent, so the last yielded node is the root.
///
/// Consider a `width` of 2 and an input of 7 chunks, once the input is exhausted
/// the levels still holding links are folded bottom-up, yielding:
///
/// ```text
///              S7
///         /          \
///       S3            S6
///     /    \         /  \
///   S1      S2     S4    S5
///  /  \    /  \   /  \   |
/// B1  B2  B3  B4 B5  B6  B7
/// ```
///
/// A single chunk is its own root and an empty input produces a single empty leaf.
pub(crate) fn stream_balanced_tree<I>(
    input: I,
    width: usize,
    builder: CidBuilder,
    leaf_format: LeafFormat,
) -> impl Stream<Item = Result<EncodedNode, Error>>
where
    I: Stream<Item = Result<Bytes, Error>> + Send,
{
    try_stream! {
        let mut tree: VecDeque<Vec<(Cid, LinkInfo)>> = VecDeque::new();
        tree.push_back(vec![]);

        let input = input
            .map(|data| data.and_then(|data| TreeNode::Leaf(data, leaf_format).encode(&builder)));
        tokio::pin!(input);

        while let Some(leaf) = input.next().await {
            let leaf = leaf?;
            let tree_height = tree.len();

            // Check if the leaf level is full, i.e. we can build a new stem
            if tree[0].len() == width {
                // Go up the tree, as adding a new stem may complete another level and so on
                for level in 0..tree_height {
                    if tree[level].len() < width {
                        break;
                    }

                    // If we're at the top of the tree, we're going to need another level.
                    if level == tree_height - 1 {
                        tree.push_back(Vec::with_capacity(width));
                    }

                    let links = std::mem::replace(&mut tree[level], Vec::with_capacity(width));
                    let stem = TreeNode::Stem(links).encode(&builder)?;
                    tree[level + 1].push((stem.cid, stem.link));
                    yield stem;
                }
            }

            tree[0].push((leaf.cid, leaf.link));
            yield leaf;
        }

        match (tree.len(), tree[0].len()) {
            // A single chunk is its own root
            (1, 1) => return,
            (1, 0) => {
                yield TreeNode::Leaf(Bytes::new(), leaf_format).encode(&builder)?;
                return;
            }
            _ => {}
        }

        // Fold the leftover levels, starting from the bottom.
        while let Some(links) = tree.pop_front() {
            let stem = TreeNode::Stem(links).encode(&builder)?;

            // If there's still a level in the front, the stem we just built has a parent
            if let Some(front) = tree.front_mut() {
                front.push((stem.cid, stem.link));
            }
            yield stem;
        }
    }
}
