use std::io::SeekFrom;

use bytes::Bytes;
use ipld_core::cid::Cid;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

use super::index::read_index;
use crate::{
    v2::{index::Index, Characteristics, Header, PRAGMA},
    Error,
};

/// Low-level CARv2 reader.
pub struct Reader<R> {
    reader: R,
}

impl<R> Reader<R> {
    /// Constructs a new [`Reader`].
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Get a mutable reference to the inner reader.
    ///
    /// This is useful to skip padding or perform other operations the
    /// [`Reader`] does not natively support.
    pub fn get_inner_mut(&mut self) -> &mut R {
        &mut self.reader
    }
}

impl<R> Reader<R>
where
    R: AsyncRead + Unpin,
{
    /// Read the CARv2 pragma.
    ///
    /// This function fails if the pragma does not match the one defined in the
    /// [specification](https://ipld.io/specs/transport/car/carv2/#pragma).
    pub async fn read_pragma(&mut self) -> Result<(), Error> {
        let mut pragma_buffer = vec![0; PRAGMA.len()];
        self.reader.read_exact(&mut pragma_buffer).await?;
        if pragma_buffer != PRAGMA {
            return Err(Error::InvalidPragmaError(pragma_buffer));
        }
        Ok(())
    }

    /// Read the [`Header`].
    ///
    /// This function fails if there are set bits that are not covered in the
    /// [characteristics specification](https://ipld.io/specs/transport/car/carv2/#characteristics).
    ///
    /// For more information check the [header specification](https://ipld.io/specs/transport/car/carv2/#header).
    pub async fn read_header(&mut self) -> Result<Header, Error> {
        // Even though the standard doesn't explicitly state endianness, go-car does
        // https://github.com/ipld/go-car/blob/45b81c1cc5117b3340dfdb025afeca90bfbe8d86/v2/car.go#L51-L69
        let characteristics_bitfield = self.reader.read_u128_le().await?;

        let characteristics = Characteristics::from_bits(characteristics_bitfield)
            .ok_or(Error::UnknownCharacteristicsError(characteristics_bitfield))?;

        let data_offset = self.reader.read_u64_le().await?;
        let data_size = self.reader.read_u64_le().await?;
        let index_offset = self.reader.read_u64_le().await?;

        Ok(Header {
            characteristics,
            data_offset,
            data_size,
            index_offset,
        })
    }

    /// Read the [`crate::v1::Header`].
    ///
    /// See [`crate::v1::Reader`] for more information.
    pub async fn read_v1_header(&mut self) -> Result<crate::v1::Header, Error> {
        crate::v1::read_header(&mut self.reader).await
    }

    /// Read a [`Cid`] and data block.
    ///
    /// See [`crate::v1::Reader`] for more information.
    pub async fn read_block(&mut self) -> Result<(Cid, Bytes), Error> {
        crate::v1::read_block(&mut self.reader).await
    }

    /// Read an [`Index`].
    pub async fn read_index(&mut self) -> Result<Index, Error> {
        read_index(&mut self.reader).await
    }
}

impl<R> Reader<R>
where
    R: AsyncRead + AsyncSeek + Unpin,
{
    /// Look `cid` up in the index and read its block.
    ///
    /// Returns `None` if the file has no index or the block is not indexed.
    /// Inlined (identity) blocks are never indexed.
    pub async fn find_block(&mut self, cid: &Cid) -> Result<Option<Bytes>, Error> {
        self.reader.seek(SeekFrom::Start(0)).await?;
        self.read_pragma().await?;
        let header = self.read_header().await?;
        if header.index_offset == 0 {
            return Ok(None);
        }

        self.reader
            .seek(SeekFrom::Start(header.index_offset))
            .await?;
        let Some(offset) = self.read_index().await?.find(cid) else {
            return Ok(None);
        };

        self.reader
            .seek(SeekFrom::Start(header.data_offset + offset))
            .await?;
        let (found, block) = self.read_block().await?;
        // The index only holds digests, the codec may still differ
        Ok((found == *cid).then_some(block))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::Bytes;
    use ipld_core::cid::{Cid, Version};
    use tokio_util::sync::CancellationToken;

    use crate::{
        hasher::assign,
        multicodec::{DAG_PB_CODE, RAW_CODE, SHA_256_CODE},
        stores::Blockstore,
        v2::{reader::Reader, write_car_v2, Header, PRAGMA},
        Error,
    };

    async fn hello_world_car() -> (Cid, Vec<u8>) {
        let mut store = Blockstore::new();
        let data = Bytes::from_static(b"hello world");
        let root = assign(&data, RAW_CODE, SHA_256_CODE, Version::V1).unwrap();
        store.put(root, data);

        let mut output = vec![];
        write_car_v2(&store, root, &mut output, CancellationToken::new())
            .await
            .unwrap();
        (root, output)
    }

    #[tokio::test]
    async fn pragma() {
        let mut reader = Reader::new(Cursor::new(PRAGMA.to_vec()));
        assert!(matches!(reader.read_pragma().await, Ok(())));
    }

    #[tokio::test]
    async fn bad_pragma() {
        let mut bad_pragma = vec![0u8; 11];
        bad_pragma.fill_with(rand::random);
        bad_pragma[0] = 0x0b;
        let mut reader = Reader::new(Cursor::new(bad_pragma));
        let pragma = reader.read_pragma().await;
        assert!(matches!(pragma, Err(Error::InvalidPragmaError(_))));
    }

    #[tokio::test]
    async fn unknown_characteristics() {
        let mut header = vec![0u8; 40];
        header[0] = 1;
        let mut reader = Reader::new(Cursor::new(header));
        assert!(matches!(
            reader.read_header().await,
            Err(Error::UnknownCharacteristicsError(1))
        ));
    }

    #[tokio::test]
    async fn inner_car() {
        let (root, car) = hello_world_car().await;

        let mut reader = Reader::new(Cursor::new(car));
        reader.read_pragma().await.unwrap();
        let header = reader.read_header().await.unwrap();
        assert_eq!(header.data_offset, Header::SIZE as u64);

        let v1_header = reader.read_v1_header().await.unwrap();
        assert_eq!(v1_header.roots, vec![root]);
        let (cid, block) = reader.read_block().await.unwrap();
        assert_eq!(cid, root);
        assert_eq!(block.as_ref(), b"hello world");
    }

    #[tokio::test]
    async fn find_block() {
        let (root, car) = hello_world_car().await;
        let mut reader = Reader::new(Cursor::new(car));

        assert_eq!(
            reader.find_block(&root).await.unwrap(),
            Some(Bytes::from_static(b"hello world"))
        );

        // Same digest, different codec
        let other = Cid::new_v1(DAG_PB_CODE, *root.hash());
        assert_eq!(reader.find_block(&other).await.unwrap(), None);

        let missing = assign(b"missing", RAW_CODE, SHA_256_CODE, Version::V1).unwrap();
        assert_eq!(reader.find_block(&missing).await.unwrap(), None);
    }

    #[tokio::test]
    async fn find_block_without_index() {
        let (root, mut car) = hello_world_car().await;
        // Zero out the index offset
        car[43..51].fill(0);
        let mut reader = Reader::new(Cursor::new(car));
        assert_eq!(reader.find_block(&root).await.unwrap(), None);
    }
}
