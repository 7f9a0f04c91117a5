use ipld_core::{cid::Cid, codec::Codec};
use serde_ipld_dagcbor::codec::DagCborCodec;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::{async_varint::write_varint, v1::Header, Error};

/// Write [`crate::v1::Header`] to the provider writer.
///
/// Returns the number of bytes written.
pub(crate) async fn write_header<W>(writer: &mut W, header: &Header) -> Result<usize, Error>
where
    W: AsyncWrite + Unpin,
{
    let encoded_header = DagCborCodec::encode_to_vec(header)?;
    let prefix = write_varint(writer, encoded_header.len()).await?;
    writer.write_all(&encoded_header).await?;
    Ok(prefix + encoded_header.len())
}

/// Write a [`Cid`] and data block to the given writer.
///
/// This is a low-level function to be used in the implementation of CAR writers.
/// Returns the number of bytes written.
pub(crate) async fn write_block<W, Block>(
    writer: &mut W,
    cid: &Cid,
    block: Block,
) -> Result<usize, Error>
where
    W: AsyncWrite + Unpin,
    Block: AsRef<[u8]>,
{
    let data = block.as_ref();
    let len = cid.encoded_len() + data.len();

    let prefix = write_varint(writer, len).await?;
    writer.write_all(&cid.to_bytes()).await?;
    writer.write_all(data).await?;
    Ok(prefix + len)
}

/// Low-level CARv1 writer.
pub struct Writer<W> {
    writer: W,
}

impl<W> Writer<W> {
    /// Construct a new [`crate::v1::Writer`].
    ///
    /// Takes a writer into which the data will be written.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W> Writer<W>
where
    W: AsyncWrite + Unpin,
{
    /// Write a [`crate::v1::Header`].
    ///
    /// Returns the number of bytes written.
    pub async fn write_header(&mut self, header: &Header) -> Result<usize, Error> {
        write_header(&mut self.writer, header).await
    }

    /// Write a [`Cid`] and the respective data block.
    ///
    /// Returns the number of bytes written.
    pub async fn write_block<D>(&mut self, cid: &Cid, data: &D) -> Result<usize, Error>
    where
        D: AsRef<[u8]>,
    {
        write_block(&mut self.writer, cid, data).await
    }

    /// Flushes and returns the inner writer.
    pub async fn finish(mut self) -> Result<W, Error> {
        self.writer.flush().await?;
        Ok(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use ipld_core::cid::{Cid, Version};
    use tokio::io::BufWriter;

    use super::Writer;
    use crate::{
        hasher::CidBuilder,
        multicodec::{RAW_CODE, SHA_256_CODE},
        test_utils::assert_buffer_eq,
        v1::Header,
    };

    impl Writer<BufWriter<Vec<u8>>> {
        fn test_writer() -> Self {
            let buffer = Vec::new();
            let buf_writer = BufWriter::new(buffer);
            Writer::new(buf_writer)
        }
    }

    fn raw_cid(data: &[u8]) -> Cid {
        CidBuilder::new(Version::V1, SHA_256_CODE)
            .unwrap()
            .sum(RAW_CODE, data)
            .unwrap()
    }

    #[tokio::test]
    async fn header_writer() {
        let root_cid = raw_cid(b"hello world");

        let mut writer = Writer::test_writer();
        let written = writer
            .write_header(&Header::new(vec![root_cid]))
            .await
            .unwrap();
        let buf_writer = writer.finish().await.unwrap();

        let expected: Vec<u8> = [
            &[0x3a, 0xa2, 0x65][..],
            b"roots",
            &[0x81, 0xd8, 0x2a, 0x58, 0x25, 0x00],
            root_cid.to_bytes().as_slice(),
            &[0x67],
            b"version",
            &[0x01],
        ]
        .concat();
        assert_eq!(written, 59);
        assert_buffer_eq!(&expected, buf_writer.get_ref());
    }

    #[tokio::test]
    async fn full_writer() {
        let root_cid = raw_cid(b"hello world");

        let mut writer = Writer::test_writer();
        let header = writer
            .write_header(&Header::new(vec![root_cid]))
            .await
            .unwrap();
        let block = writer.write_block(&root_cid, b"hello world").await.unwrap();
        let buf_writer = writer.finish().await.unwrap();

        // varint(36 + 11) + CID + data
        assert_eq!(block, 48);
        let frame = &buf_writer.get_ref()[header..];
        assert_eq!(frame.len(), block);
        assert_eq!(frame[0], 47);
        assert_eq!(&frame[1..37], root_cid.to_bytes().as_slice());
        assert_eq!(&frame[37..], b"hello world");
    }
}
