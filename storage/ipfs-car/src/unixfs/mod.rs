//! UnixFS node encoding and the file layouts built on top of it.

mod balanced;
mod trickle;
mod unixfs_pb;

pub(crate) use balanced::stream_balanced_tree;
pub(crate) use trickle::stream_trickle_tree;

use bytes::Bytes;
use ipld_core::{cid::Cid, codec::Codec};
use ipld_dagpb::{DagPbCodec, PbLink, PbNode};
use quick_protobuf::MessageWrite;

use crate::{
    hasher::CidBuilder,
    multicodec::{DAG_PB_CODE, RAW_CODE},
    Error,
};

/// Sizes carried by a link to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LinkInfo {
    /// File bytes below the node.
    pub raw_data_length: u64,
    /// Encoded bytes of the node and everything below it, the link's `Tsize`.
    pub encoded_data_length: u64,
}

impl LinkInfo {
    pub fn new(raw_data_length: u64, encoded_data_length: u64) -> Self {
        Self {
            raw_data_length,
            encoded_data_length,
        }
    }
}

/// Encoded node, ready to be stored.
#[derive(Debug, Clone)]
pub(crate) struct EncodedNode {
    pub cid: Cid,
    pub data: Bytes,
    pub link: LinkInfo,
}

/// How file chunks are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LeafFormat {
    /// The chunk is the block, using the raw codec.
    Raw,
    /// The chunk is wrapped in a dag-pb node of UnixFS type `File`.
    File,
    /// The chunk is wrapped in a dag-pb node of UnixFS type `Raw`, used by the trickle layout.
    PbRaw,
}

impl LeafFormat {
    pub fn new(raw_leaves: bool, fallback: LeafFormat) -> Self {
        if raw_leaves {
            LeafFormat::Raw
        } else {
            fallback
        }
    }
}

/// Named directory link.
#[derive(Debug, Clone)]
pub(crate) struct DirEntry {
    pub name: String,
    pub cid: Cid,
    pub link: LinkInfo,
}

#[derive(Debug)]
pub(crate) enum TreeNode {
    Leaf(Bytes, LeafFormat),
    Stem(Vec<(Cid, LinkInfo)>),
    Directory(Vec<DirEntry>),
    Symlink(Bytes),
}

impl TreeNode {
    pub fn encode(self, builder: &CidBuilder) -> Result<EncodedNode, Error> {
        match self {
            TreeNode::Leaf(bytes, LeafFormat::Raw) => {
                let data_length = bytes.len() as u64;
                let cid = builder.sum(RAW_CODE, &bytes)?;
                Ok(EncodedNode {
                    cid,
                    data: bytes,
                    // The data is raw, so the raw length == encoded length
                    link: LinkInfo::new(data_length, data_length),
                })
            }
            TreeNode::Leaf(bytes, format) => {
                let data_length = bytes.len() as u64;
                let data = unixfs_pb::Data {
                    Type: match format {
                        LeafFormat::PbRaw => unixfs_pb::mod_Data::DataType::Raw,
                        _ => unixfs_pb::mod_Data::DataType::File,
                    },
                    Data: (!bytes.is_empty()).then(|| bytes.as_ref().into()),
                    filesize: Some(data_length),
                    ..Default::default()
                };
                let outer = encode_pb_node(vec![], &data)?;
                let encoded_length = outer.len() as u64;
                Ok(EncodedNode {
                    cid: builder.sum(DAG_PB_CODE, &outer)?,
                    data: outer.into(),
                    link: LinkInfo::new(data_length, encoded_length),
                })
            }
            TreeNode::Stem(links) => {
                let mut encoded_length: u64 =
                    links.iter().map(|(_, l)| l.encoded_data_length).sum();
                let blocksizes: Vec<_> = links.iter().map(|(_, l)| l.raw_data_length).collect();
                let filesize: u64 = blocksizes.iter().sum();
                let pb_links: Vec<_> = links
                    .into_iter()
                    .map(|(cid, link)| PbLink {
                        cid,
                        // Having an empty name makes it compliant with go-car
                        name: Some("".to_string()),
                        size: Some(link.encoded_data_length),
                    })
                    .collect();

                let data = unixfs_pb::Data {
                    Type: unixfs_pb::mod_Data::DataType::File,
                    filesize: Some(filesize),
                    blocksizes,
                    ..Default::default()
                };
                let outer = encode_pb_node(pb_links, &data)?;
                encoded_length += outer.len() as u64;

                Ok(EncodedNode {
                    cid: builder.sum(DAG_PB_CODE, &outer)?,
                    data: outer.into(),
                    link: LinkInfo::new(filesize, encoded_length),
                })
            }
            TreeNode::Directory(mut entries) => {
                // dag-pb requires links to be sorted by their name bytes
                entries.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));

                let raw_length = entries.iter().map(|e| e.link.raw_data_length).sum();
                let mut encoded_length: u64 =
                    entries.iter().map(|e| e.link.encoded_data_length).sum();
                let pb_links = entries
                    .into_iter()
                    .map(|entry| PbLink {
                        cid: entry.cid,
                        name: Some(entry.name),
                        size: Some(entry.link.encoded_data_length),
                    })
                    .collect();

                let data = unixfs_pb::Data {
                    Type: unixfs_pb::mod_Data::DataType::Directory,
                    ..Default::default()
                };
                let outer = encode_pb_node(pb_links, &data)?;
                encoded_length += outer.len() as u64;

                Ok(EncodedNode {
                    cid: builder.sum(DAG_PB_CODE, &outer)?,
                    data: outer.into(),
                    link: LinkInfo::new(raw_length, encoded_length),
                })
            }
            TreeNode::Symlink(target) => {
                let data = unixfs_pb::Data {
                    Type: unixfs_pb::mod_Data::DataType::Symlink,
                    Data: Some(target.as_ref().into()),
                    ..Default::default()
                };
                let outer = encode_pb_node(vec![], &data)?;
                let encoded_length = outer.len() as u64;
                Ok(EncodedNode {
                    cid: builder.sum(DAG_PB_CODE, &outer)?,
                    data: outer.into(),
                    link: LinkInfo::new(0, encoded_length),
                })
            }
        }
    }
}

fn encode_pb_node(links: Vec<PbLink>, data: &unixfs_pb::Data) -> Result<Vec<u8>, Error> {
    let mut data_bytes = vec![];
    let mut writer = quick_protobuf::Writer::new(&mut data_bytes);
    data.write_message(&mut writer)?;

    let node = PbNode {
        links,
        data: Some(data_bytes.into()),
    };
    Ok(DagPbCodec::encode_to_vec(&node)?)
}
