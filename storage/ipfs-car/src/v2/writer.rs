use byteorder::{LittleEndian, WriteBytesExt};
use ipld_core::cid::Cid;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::{Header, PRAGMA};
use crate::{v2::index::Index, Error};

/// Low-level CARv2 writer.
pub struct Writer<W> {
    writer: W,
}

impl<W> Writer<W> {
    /// Construct a new [`Writer`].
    ///
    /// Takes a write into which the data will be written.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Get a mutable reference to the inner writer.
    pub fn get_inner_mut(&mut self) -> &mut W {
        &mut self.writer
    }
}

impl<W> Writer<W>
where
    W: AsyncWrite + Unpin,
{
    /// Write the pragma and a [`Header`].
    ///
    /// Returns the number of bytes written.
    pub async fn write_header(&mut self, header: &Header) -> Result<usize, Error> {
        self.writer.write_all(&PRAGMA).await?;

        let mut buffer = [0; 40];
        let mut handle = &mut buffer[..];
        WriteBytesExt::write_u128::<LittleEndian>(&mut handle, header.characteristics.bits())?;
        WriteBytesExt::write_u64::<LittleEndian>(&mut handle, header.data_offset)?;
        WriteBytesExt::write_u64::<LittleEndian>(&mut handle, header.data_size)?;
        WriteBytesExt::write_u64::<LittleEndian>(&mut handle, header.index_offset)?;

        self.writer.write_all(&buffer).await?;
        Ok(PRAGMA.len() + buffer.len())
    }

    /// Write a [`crate::v1::Header`].
    ///
    /// Returns the number of bytes written.
    pub async fn write_v1_header(&mut self, v1_header: &crate::v1::Header) -> Result<usize, Error> {
        crate::v1::write_header(&mut self.writer, v1_header).await
    }

    /// Write a [`Cid`] and the respective data block.
    ///
    /// Returns the number of bytes written.
    pub async fn write_block<Block>(&mut self, cid: &Cid, block: &Block) -> Result<usize, Error>
    where
        Block: AsRef<[u8]>,
    {
        crate::v1::write_block(&mut self.writer, cid, block).await
    }

    /// Write an [`Index`].
    ///
    /// Returns the number of bytes written.
    pub async fn write_index(&mut self, index: &Index) -> Result<usize, Error> {
        crate::v2::index::write_index(&mut self.writer, index).await
    }

    /// Flushes and returns the inner writer.
    pub async fn finish(mut self) -> Result<W, Error> {
        self.writer.flush().await?;
        Ok(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeMap, io::Cursor};

    use ipld_core::cid::Version;
    use tokio::io::BufWriter;

    use crate::{
        hasher::assign,
        multicodec::{RAW_CODE, SHA_256_CODE},
        test_utils::assert_buffer_eq,
        v2::{Header, Index, IndexEntry, MultiWidthIndex, Reader, Writer, PRAGMA},
    };

    impl Writer<BufWriter<Vec<u8>>> {
        fn test_writer() -> Self {
            let buffer = Vec::new();
            let buf_writer = BufWriter::new(buffer);
            Writer::new(buf_writer)
        }
    }

    #[tokio::test]
    async fn header() {
        let mut writer = Writer::test_writer();
        let written = writer
            .write_header(&Header::new(true, 51, 7661, 7712))
            .await
            .unwrap();
        let inner = writer.finish().await.unwrap().into_inner();
        assert_eq!(written, 51);

        let mut expected = PRAGMA.to_vec();
        expected.extend((1u128 << 127).to_le_bytes());
        expected.extend(51u64.to_le_bytes());
        expected.extend(7661u64.to_le_bytes());
        expected.extend(7712u64.to_le_bytes());
        assert_buffer_eq!(&expected, &inner);
    }

    #[tokio::test]
    async fn hand_assembled() {
        let data = b"hello world";
        let cid = assign(data, RAW_CODE, SHA_256_CODE, Version::V1).unwrap();

        let mut writer = Writer::test_writer();
        let mut written = writer
            .write_header(&Header::new(false, 51, 107, 158))
            .await
            .unwrap();
        let v1_header = writer
            .write_v1_header(&crate::v1::Header::new(vec![cid]))
            .await
            .unwrap();
        written += v1_header;
        written += writer.write_block(&cid, data).await.unwrap();
        let index = Index::multihash(BTreeMap::from([(
            SHA_256_CODE,
            MultiWidthIndex::from(IndexEntry::new(
                cid.hash().digest().to_vec(),
                v1_header as u64,
            )),
        )]));
        written += writer.write_index(&index).await.unwrap();
        let inner = writer.finish().await.unwrap().into_inner();
        assert_eq!(written, 228);
        assert_eq!(inner.len(), written);

        let mut reader = Reader::new(Cursor::new(inner));
        assert_eq!(
            reader.find_block(&cid).await.unwrap().as_deref(),
            Some(&data[..])
        );
    }
}
