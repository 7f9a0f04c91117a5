use std::collections::BTreeMap;

use ipld_core::cid::Cid;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    async_varint::{read_varint, write_varint},
    Error,
};

pub const INDEX_SORTED_CODE: u64 = 0x0400;
pub const MULTIHASH_INDEX_SORTED_CODE: u64 = 0x0401;

/// Width of the offset stored after each digest.
const OFFSET_WIDTH: u32 = 8;

// Basically, everything that does not have explicit endianness
// is little-endian, as made evident by the go-car source code
// https://github.com/ipld/go-car/blob/45b81c1cc5117b3340dfdb025afeca90bfbe8d86/v2/index/mhindexsorted.go#L45-L53

/// A index entry for a data block inside the CARv1.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct IndexEntry {
    /// Hash digest of the data.
    pub digest: Vec<u8>,

    /// Offset to the first byte of the varint that prefix the CID:Bytes pair within the CARv1 payload.
    ///
    /// See the [data section in the CARv1 specification](https://ipld.io/specs/transport/car/carv1/#data)
    /// for details on block encoding.
    pub offset: u64,
}

impl IndexEntry {
    /// Construct a new [`IndexEntry`].
    pub fn new(digest: Vec<u8>, offset: u64) -> Self {
        Self { digest, offset }
    }
}

/// An index containing a single digest length.
#[derive(Debug, PartialEq, Eq)]
pub struct SingleWidthIndex {
    /// The hash digest and the respective offset length.
    pub width: u32,

    /// The number of index entries.
    /// It is serialized as the length of all entries in bytes
    /// (i.e. `self.count * self.width`).
    ///
    /// See `go-car`'s source code for more information:
    /// https://github.com/ipld/go-car/blob/45b81c1cc5117b3340dfdb025afeca90bfbe8d86/v2/index/indexsorted.go#L29
    pub count: u64,

    /// The index entries, sorted by digest.
    pub entries: Vec<IndexEntry>,
}

impl SingleWidthIndex {
    /// Construct a new [`SingleWidthIndex`].
    ///
    /// Notes:
    /// * The `digest_width` should not account for the offset length.
    /// * This function sorts the `entries`.
    fn new(digest_width: u32, count: u64, mut entries: Vec<IndexEntry>) -> Self {
        entries.sort();
        Self {
            width: digest_width + OFFSET_WIDTH,
            count,
            entries,
        }
    }

    /// Width of the digests in this bucket.
    pub fn digest_width(&self) -> usize {
        (self.width - OFFSET_WIDTH) as usize
    }

    /// Offset of the frame whose multihash digest is `digest`.
    pub fn find(&self, digest: &[u8]) -> Option<u64> {
        self.entries
            .binary_search_by(|entry| entry.digest.as_slice().cmp(digest))
            .ok()
            .map(|position| self.entries[position].offset)
    }
}

impl From<IndexEntry> for SingleWidthIndex {
    fn from(value: IndexEntry) -> Self {
        SingleWidthIndex::new(value.digest.len() as u32, 1, vec![value])
    }
}

impl TryFrom<Vec<IndexEntry>> for SingleWidthIndex {
    type Error = Error;

    /// Performs the conversion, validating that all indexes have the same width.
    fn try_from(value: Vec<IndexEntry>) -> Result<Self, Self::Error> {
        let Some(first) = value.first() else {
            return Err(Error::EmptyIndexError);
        };
        let width = first.digest.len();
        if let Some(entry) = value.iter().find(|entry| entry.digest.len() != width) {
            return Err(Error::NonMatchingDigestError {
                expected: width,
                received: entry.digest.len(),
            });
        }
        let count = value.len() as u64;
        Ok(Self::new(width as u32, count, value))
    }
}

/// An index containing hash digests of multiple lengths.
///
/// To find a given index entry, first find the right index width,
/// and then find the hash to the data block.
///
/// For more details, read the [`Format 0x0400: IndexSorted`](https://ipld.io/specs/transport/car/carv2/#format-0x0400-indexsorted) section in the CARv2 specification.
#[derive(Debug, PartialEq, Eq)]
pub struct MultiWidthIndex(pub Vec<SingleWidthIndex>);

impl MultiWidthIndex {
    pub fn find(&self, digest: &[u8]) -> Option<u64> {
        self.0
            .iter()
            .find(|bucket| bucket.digest_width() == digest.len())
            .and_then(|bucket| bucket.find(digest))
    }
}

impl From<IndexEntry> for MultiWidthIndex {
    fn from(value: IndexEntry) -> Self {
        Self(vec![SingleWidthIndex::from(value)])
    }
}

impl From<SingleWidthIndex> for MultiWidthIndex {
    fn from(value: SingleWidthIndex) -> Self {
        Self(vec![value])
    }
}

impl From<Vec<SingleWidthIndex>> for MultiWidthIndex {
    fn from(value: Vec<SingleWidthIndex>) -> Self {
        Self(value)
    }
}

/// An index mapping Multihash codes to [`MultiWidthIndex`].
///
/// For more details, read the [`Format 0x0401: MultihashIndexSorted`](https://ipld.io/specs/transport/car/carv2/#format-0x0401-multihashindexsorted) section in the CARv2 specification.
#[derive(Debug, PartialEq, Eq)]
pub struct MultihashIndexSorted(pub BTreeMap<u64, MultiWidthIndex>);

impl MultihashIndexSorted {
    /// Offset of the frame for `cid`, relative to the start of the CARv1 payload.
    pub fn find(&self, cid: &Cid) -> Option<u64> {
        let multihash = cid.hash();
        self.0
            .get(&multihash.code())
            .and_then(|index| index.find(multihash.digest()))
    }
}

impl From<BTreeMap<u64, MultiWidthIndex>> for MultihashIndexSorted {
    fn from(value: BTreeMap<u64, MultiWidthIndex>) -> Self {
        Self(value)
    }
}

/// CARv2 index.
#[derive(Debug, PartialEq, Eq)]
pub enum Index {
    IndexSorted(MultiWidthIndex),
    MultihashIndexSorted(MultihashIndexSorted),
}

impl Index {
    pub fn multihash(index: BTreeMap<u64, MultiWidthIndex>) -> Self {
        Self::MultihashIndexSorted(index.into())
    }

    /// Offset of the frame for `cid`, relative to the start of the CARv1 payload.
    ///
    /// [`Index::IndexSorted`] does not record hash functions,
    /// only the digest is matched.
    pub fn find(&self, cid: &Cid) -> Option<u64> {
        match self {
            Index::IndexSorted(index) => index.find(cid.hash().digest()),
            Index::MultihashIndexSorted(index) => index.find(cid),
        }
    }
}

/// Returns the number of bytes written.
pub(crate) async fn write_index<W>(mut writer: W, index: &Index) -> Result<usize, Error>
where
    W: AsyncWrite + Unpin,
{
    let written = match index {
        Index::IndexSorted(index) => {
            write_varint(&mut writer, INDEX_SORTED_CODE).await?
                + write_index_sorted(&mut writer, index).await?
        }
        Index::MultihashIndexSorted(index) => {
            write_varint(&mut writer, MULTIHASH_INDEX_SORTED_CODE).await?
                + write_multihash_index_sorted(&mut writer, index).await?
        }
    };
    Ok(written)
}

pub(crate) async fn write_multihash_index_sorted<W>(
    mut writer: W,
    index: &MultihashIndexSorted,
) -> Result<usize, Error>
where
    W: AsyncWrite + Unpin,
{
    writer.write_i32_le(index.0.len() as i32).await?;
    let mut written = 4;
    for (hash_code, index) in index.0.iter() {
        writer.write_u64_le(*hash_code).await?;
        written += 8 + write_index_sorted(&mut writer, index).await?;
    }
    Ok(written)
}

pub(crate) async fn write_index_sorted<W>(
    mut writer: W,
    index: &MultiWidthIndex,
) -> Result<usize, Error>
where
    W: AsyncWrite + Unpin,
{
    writer.write_i32_le(index.0.len() as i32).await?;
    let mut written = 4;
    for idx in &index.0 {
        written += write_single_width_index(&mut writer, idx).await?;
    }
    Ok(written)
}

pub(crate) async fn write_single_width_index<W>(
    mut writer: W,
    index: &SingleWidthIndex,
) -> Result<usize, Error>
where
    W: AsyncWrite + Unpin,
{
    writer.write_u32_le(index.width).await?;
    writer
        .write_u64_le(index.count * (index.width as u64))
        .await?;
    for entry in &index.entries {
        writer.write_all(&entry.digest).await?;
        writer.write_u64_le(entry.offset).await?;
    }
    Ok(12 + index.entries.len() * index.width as usize)
}

pub(crate) async fn read_index<R>(mut reader: R) -> Result<Index, Error>
where
    R: AsyncRead + Unpin,
{
    let index_type: u64 = read_varint(&mut reader).await?;
    match index_type {
        INDEX_SORTED_CODE => Ok(Index::IndexSorted(read_index_sorted(&mut reader).await?)),
        MULTIHASH_INDEX_SORTED_CODE => Ok(Index::MultihashIndexSorted(
            read_multihash_index_sorted(&mut reader).await?,
        )),
        other => Err(Error::UnknownIndexError(other)),
    }
}

pub(crate) async fn read_multihash_index_sorted<R>(
    mut reader: R,
) -> Result<MultihashIndexSorted, Error>
where
    R: AsyncRead + Unpin,
{
    let n_indexes = reader.read_i32_le().await?;
    let mut indexes = BTreeMap::new();
    for _ in 0..n_indexes {
        let multihash_code = reader.read_u64_le().await?;
        let index = read_index_sorted(&mut reader).await?;
        indexes.insert(multihash_code, index);
    }
    Ok(MultihashIndexSorted(indexes))
}

pub(crate) async fn read_index_sorted<R>(mut reader: R) -> Result<MultiWidthIndex, Error>
where
    R: AsyncRead + Unpin,
{
    let n_buckets = reader.read_i32_le().await?;
    let mut buckets = Vec::with_capacity(n_buckets.max(0) as usize);
    for _ in 0..n_buckets {
        let index = read_single_width_index(&mut reader).await?;
        buckets.push(index);
    }
    Ok(MultiWidthIndex(buckets))
}

pub(crate) async fn read_single_width_index<R>(mut reader: R) -> Result<SingleWidthIndex, Error>
where
    R: AsyncRead + Unpin,
{
    let width = reader.read_u32_le().await?;
    if width <= OFFSET_WIDTH {
        return Err(Error::IoError(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("index width {width} cannot hold a digest"),
        )));
    }
    // Because someone decided that "total number of hash digests" means their length in bytes...
    // https://github.com/ipld/go-car/blob/45b81c1cc5117b3340dfdb025afeca90bfbe8d86/v2/index/indexsorted.go#L29
    let count = reader.read_u64_le().await? / (width as u64);
    let mut entries = Vec::new();
    for _ in 0..count {
        let mut digest = vec![0; (width - OFFSET_WIDTH) as usize];
        reader.read_exact(&mut digest).await?;
        let offset = reader.read_u64_le().await?;
        entries.push(IndexEntry { digest, offset });
    }

    // > ... and finally within those buckets ordered by a simple byte-wise sorting.
    // https://ipld.io/specs/transport/car/carv2/#format-0x0401-multihashindexsorted
    entries.sort();

    Ok(SingleWidthIndex {
        width,
        count,
        entries,
    })
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeMap, io::Cursor};

    use ipld_core::cid::{Cid, Version};
    use rstest::rstest;
    use sha2::{Digest, Sha256, Sha512};

    use super::{
        read_index, write_index, Index, IndexEntry, MultiWidthIndex, SingleWidthIndex,
    };
    use crate::{
        hasher::assign,
        multicodec::{RAW_CODE, SHA_256_CODE, SHA_512_CODE},
        Error,
    };

    fn entries<H: Digest>(count: u64) -> Vec<IndexEntry> {
        (0..count)
            .map(|idx| IndexEntry::new(H::digest(idx.to_le_bytes()).to_vec(), idx * 100))
            .collect()
    }

    #[test]
    fn entries_are_sorted() {
        let index = SingleWidthIndex::try_from(entries::<Sha256>(16)).unwrap();
        assert_eq!(index.width, 40);
        assert_eq!(index.count, 16);
        assert!(index.entries.windows(2).all(|w| w[0].digest < w[1].digest));
    }

    #[test]
    fn invalid_single_width_index() {
        assert!(matches!(
            SingleWidthIndex::try_from(vec![]),
            Err(Error::EmptyIndexError)
        ));

        let mut mixed = entries::<Sha256>(2);
        mixed.extend(entries::<Sha512>(1));
        assert!(matches!(
            SingleWidthIndex::try_from(mixed),
            Err(Error::NonMatchingDigestError {
                expected: 32,
                received: 64
            })
        ));
    }

    #[test]
    fn find() {
        let sha256 = SingleWidthIndex::try_from(entries::<Sha256>(8)).unwrap();
        let sha512 = SingleWidthIndex::try_from(entries::<Sha512>(3)).unwrap();
        let index = Index::multihash(BTreeMap::from([
            (SHA_256_CODE, MultiWidthIndex::from(sha256)),
            (SHA_512_CODE, MultiWidthIndex::from(sha512)),
        ]));

        for idx in 0..8u64 {
            let cid = assign(&idx.to_le_bytes(), RAW_CODE, SHA_256_CODE, Version::V1).unwrap();
            assert_eq!(index.find(&cid), Some(idx * 100));
        }
        let cid = assign(&2u64.to_le_bytes(), RAW_CODE, SHA_512_CODE, Version::V1).unwrap();
        assert_eq!(index.find(&cid), Some(200));

        let missing = assign(b"missing", RAW_CODE, SHA_256_CODE, Version::V1).unwrap();
        assert_eq!(index.find(&missing), None);
        let unindexed = assign(b"missing", RAW_CODE, 0xb220, Version::V1).unwrap();
        assert_eq!(index.find(&unindexed), None);
    }

    #[tokio::test]
    async fn multihash_index_layout() {
        let entry = IndexEntry::new(Sha256::digest(b"hello world").to_vec(), 59);
        let index = Index::multihash(BTreeMap::from([(
            SHA_256_CODE,
            MultiWidthIndex::from(entry.clone()),
        )]));

        let mut buffer = vec![];
        let written = write_index(&mut buffer, &index).await.unwrap();
        assert_eq!(written, 70);
        assert_eq!(buffer.len(), written);

        let expected: Vec<u8> = [
            &[0x81, 0x08][..],
            &1i32.to_le_bytes(),
            &SHA_256_CODE.to_le_bytes(),
            &1i32.to_le_bytes(),
            &40u32.to_le_bytes(),
            &40u64.to_le_bytes(),
            entry.digest.as_slice(),
            &59u64.to_le_bytes(),
        ]
        .concat();
        assert_eq!(buffer, expected);
        assert_eq!(read_index(Cursor::new(buffer)).await.unwrap(), index);
    }

    #[rstest]
    #[case(Index::IndexSorted(MultiWidthIndex(vec![
        SingleWidthIndex::try_from(entries::<Sha256>(4)).unwrap(),
        SingleWidthIndex::try_from(entries::<Sha512>(2)).unwrap(),
    ])))]
    #[case(Index::multihash(BTreeMap::new()))]
    #[tokio::test]
    async fn read_back(#[case] index: Index) {
        let mut buffer = vec![];
        write_index(&mut buffer, &index).await.unwrap();
        assert_eq!(read_index(Cursor::new(buffer)).await.unwrap(), index);
    }

    #[tokio::test]
    async fn unknown_index() {
        // 0x0402 is not an index type
        let result = read_index(Cursor::new(vec![0x82, 0x08])).await;
        assert!(matches!(result, Err(Error::UnknownIndexError(0x0402))));
    }

    #[test]
    fn index_sorted_ignores_the_hash_function() {
        let index = Index::IndexSorted(MultiWidthIndex::from(IndexEntry::new(
            Sha256::digest(b"data").to_vec(),
            7,
        )));
        let cid = Cid::new_v1(
            RAW_CODE,
            crate::multicodec::generate_multihash::<Sha256>(b"data"),
        );
        assert_eq!(index.find(&cid), Some(7));
    }
}
