//! One-call import and packaging.

use ipld_core::cid::Cid;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

use crate::{
    importer::{Importer, Input},
    options::ImportOptions,
    stores::{BlockService, Exchange},
    v1::write_car_v1,
    v2::write_car_v2,
    Error,
};

/// Imports content and wraps the resulting DAG into a CAR.
///
/// Blocks are kept in the inner [`Importer`], so artifacts built from
/// the same [`Builder`] share (and de-duplicate) them.
#[derive(Debug, Default)]
pub struct Builder {
    importer: Importer,
}

impl Builder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Construct a [`Builder`] whose blocks are announced to `exchange`,
    /// which is also asked for blocks missing while writing.
    pub fn with_exchange(exchange: Box<dyn Exchange>) -> Self {
        Self {
            importer: Importer::with_exchange(exchange),
        }
    }

    /// Import `input` and prepare it to be written as a CARv1.
    pub async fn build_v1(
        &mut self,
        input: Input,
        options: ImportOptions,
    ) -> Result<CarV1<'_>, Error> {
        let cancellation = options.cancellation.clone();
        let root = self.importer.import(input, options).await?;
        Ok(CarV1 {
            service: self.importer.block_service(),
            root,
            cancellation,
        })
    }

    /// Import `input` and prepare it to be written as an indexed CARv2.
    pub async fn build_v2(
        &mut self,
        input: Input,
        options: ImportOptions,
    ) -> Result<CarV2<'_>, Error> {
        let cancellation = options.cancellation.clone();
        let root = self.importer.import(input, options).await?;
        Ok(CarV2 {
            service: self.importer.block_service(),
            root,
            cancellation,
        })
    }

    pub fn importer(&self) -> &Importer {
        &self.importer
    }
}

/// An imported DAG, ready to be written as a CARv1.
#[derive(Debug)]
pub struct CarV1<'a> {
    service: &'a BlockService,
    root: Cid,
    cancellation: CancellationToken,
}

impl CarV1<'_> {
    pub fn root(&self) -> Cid {
        self.root
    }

    /// Write the CARv1, returning the number of bytes written.
    ///
    /// Writing is deterministic, it can be repeated.
    pub async fn write<W>(&self, writer: &mut W) -> Result<usize, Error>
    where
        W: AsyncWrite + Unpin,
    {
        write_car_v1(self.service, self.root, writer, self.cancellation.clone()).await
    }
}

/// An imported DAG, ready to be written as a CARv2.
#[derive(Debug)]
pub struct CarV2<'a> {
    service: &'a BlockService,
    root: Cid,
    cancellation: CancellationToken,
}

impl CarV2<'_> {
    pub fn root(&self) -> Cid {
        self.root
    }

    /// Write the CARv2, returning the number of bytes written.
    pub async fn write<W>(&self, writer: &mut W) -> Result<usize, Error>
    where
        W: AsyncWrite + Unpin,
    {
        write_car_v2(self.service, self.root, writer, self.cancellation.clone()).await
    }
}
