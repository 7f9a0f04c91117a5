use ipld_core::cid::{multihash::Multihash, Cid, Version};
use multihash_codetable::{Code, MultihashDigest};

use crate::{
    multicodec::{DAG_PB_CODE, IDENTITY_CODE, MAX_IDENTITY_DIGEST_SIZE, SHA_256_CODE},
    Error,
};

/// Assigns [`Cid`]s to blocks.
///
/// The builder is validated once on construction, so [`CidBuilder::sum`]
/// only fails on malformed inputs (e.g. CIDv0 for non-sha2-256 digests, which cannot happen
/// through the public constructors).
///
/// When inlining is enabled, blocks whose length is less than or equal to the limit
/// are embedded in the [`Cid`] itself, using the identity multihash, mirroring
/// [`go-cidutil`'s `InlineBuilder`](https://github.com/ipfs/go-cidutil/blob/8e8b2c3cf8fa1b9d4b3c16e9b0d86e7dbb41e6ee/inline.go).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CidBuilder {
    version: Version,
    hash_code: u64,
    code: Code,
    inline_limit: Option<usize>,
}

impl CidBuilder {
    /// Construct a new [`CidBuilder`] for the given CID version and multihash code.
    ///
    /// Fails with [`Error::InvalidHashType`] if the code is not in the supported table
    /// and with [`Error::IncompatibleCidVersion`] if CIDv0 is requested with anything but sha2-256.
    pub fn new(version: Version, hash_code: u64) -> Result<Self, Error> {
        let code = Code::try_from(hash_code).map_err(|_| Error::InvalidHashType(hash_code))?;
        if version == Version::V0 && hash_code != SHA_256_CODE {
            return Err(Error::IncompatibleCidVersion);
        }
        Ok(Self {
            version,
            hash_code,
            code,
            inline_limit: None,
        })
    }

    /// Enable inlining for blocks up to `limit` bytes (inclusive).
    ///
    /// A `limit` of 0 disables inlining.
    pub fn with_inline_limit(mut self, limit: usize) -> Result<Self, Error> {
        if limit > MAX_IDENTITY_DIGEST_SIZE {
            return Err(Error::InvalidInlineLimit(limit));
        }
        self.inline_limit = (limit > 0).then_some(limit);
        Ok(self)
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn hash_code(&self) -> u64 {
        self.hash_code
    }

    pub fn inline_limit(&self) -> Option<usize> {
        self.inline_limit
    }

    /// Compute the [`Cid`] of `data`, encoded with `codec`.
    pub fn sum(&self, codec: u64, data: &[u8]) -> Result<Cid, Error> {
        if let Some(limit) = self.inline_limit {
            if data.len() <= limit {
                let multihash = Multihash::wrap(IDENTITY_CODE, data)?;
                return Ok(Cid::new_v1(codec, multihash));
            }
        }

        let multihash = self.code.digest(data);
        match self.version {
            Version::V0 if codec == DAG_PB_CODE => Ok(Cid::new_v0(multihash)?),
            // CIDv0 cannot describe other codecs, go-cid upgrades the prefix to v1 instead
            Version::V0 | Version::V1 => Ok(Cid::new_v1(codec, multihash)),
        }
    }
}

/// Compute the [`Cid`] for `bytes` without inlining.
pub fn assign(bytes: &[u8], codec: u64, hash_code: u64, version: Version) -> Result<Cid, Error> {
    CidBuilder::new(version, hash_code)?.sum(codec, bytes)
}

/// Whether the [`Cid`] embeds its own data.
pub(crate) fn is_inlined(cid: &Cid) -> bool {
    cid.hash().code() == IDENTITY_CODE
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use ipld_core::cid::{Cid, Version};
    use rstest::rstest;
    use sha2::Sha256;

    use super::{assign, is_inlined, CidBuilder};
    use crate::{
        multicodec::{
            generate_multihash, BLAKE2B_256_CODE, BLAKE2S_256_CODE, DAG_PB_CODE, RAW_CODE,
            RIPEMD_160_CODE, SHA_1_CODE, SHA_256_CODE, SHA_512_CODE,
        },
        Error,
    };

    #[test]
    fn deterministic() {
        let first = assign(b"lorem ipsum", RAW_CODE, SHA_256_CODE, Version::V1).unwrap();
        let second = assign(b"lorem ipsum", RAW_CODE, SHA_256_CODE, Version::V1).unwrap();
        assert_eq!(first, second);

        let expected = Cid::new_v1(RAW_CODE, generate_multihash::<Sha256>(b"lorem ipsum"));
        assert_eq!(first, expected);
    }

    #[test]
    fn hello_world_raw() {
        let cid = assign(b"hello world", RAW_CODE, SHA_256_CODE, Version::V1).unwrap();
        assert_eq!(
            cid.to_string(),
            "bafkreifzjut3te2nhyekklss27nh3k72ysco7y32koao5eei66wof36n5e"
        );
    }

    #[rstest]
    #[case(SHA_512_CODE)]
    #[case(BLAKE2B_256_CODE)]
    #[case(SHA_1_CODE)]
    #[case(BLAKE2S_256_CODE)]
    #[case(RIPEMD_160_CODE)]
    fn v0_rejects_other_hashes(#[case] code: u64) {
        assert!(matches!(
            CidBuilder::new(Version::V0, code),
            Err(Error::IncompatibleCidVersion)
        ));
        // CIDv1 is fine though
        assert!(CidBuilder::new(Version::V1, code).is_ok());
    }

    #[rstest]
    #[case(Version::V0)]
    #[case(Version::V1)]
    fn unregistered_hash(#[case] version: Version) {
        assert!(matches!(
            CidBuilder::new(version, 0x9999),
            Err(Error::InvalidHashType(0x9999))
        ));
    }

    #[rstest]
    #[case(SHA_1_CODE, 20)]
    #[case(RIPEMD_160_CODE, 20)]
    #[case(BLAKE2S_256_CODE, 32)]
    fn legacy_hashes(#[case] code: u64, #[case] digest_len: usize) {
        let builder = CidBuilder::new(Version::V1, code).unwrap();
        let cid = builder.sum(RAW_CODE, b"hello world").unwrap();
        assert_eq!(cid.hash().code(), code);
        assert_eq!(cid.hash().digest().len(), digest_len);
    }

    #[test]
    fn v0_upgrades_raw() {
        let builder = CidBuilder::new(Version::V0, SHA_256_CODE).unwrap();
        let dag_pb = builder.sum(DAG_PB_CODE, b"data").unwrap();
        assert_eq!(dag_pb.version(), Version::V0);
        let raw = builder.sum(RAW_CODE, b"data").unwrap();
        assert_eq!(raw.version(), Version::V1);
        assert_eq!(raw.codec(), RAW_CODE);
    }

    #[test]
    fn inline_threshold() {
        let builder = CidBuilder::new(Version::V1, SHA_256_CODE)
            .unwrap()
            .with_inline_limit(4)
            .unwrap();

        let inlined = builder.sum(RAW_CODE, b"1234").unwrap();
        assert!(is_inlined(&inlined));
        assert_eq!(inlined.hash().digest(), b"1234");
        assert_eq!(
            inlined,
            Cid::from_str(&inlined.to_string()).unwrap(),
            "inlined CIDs must survive a string roundtrip"
        );

        let hashed = builder.sum(RAW_CODE, b"12345").unwrap();
        assert!(!is_inlined(&hashed));
        assert_eq!(hashed.hash().code(), SHA_256_CODE);
    }

    #[test]
    fn inline_is_always_v1() {
        let builder = CidBuilder::new(Version::V0, SHA_256_CODE)
            .unwrap()
            .with_inline_limit(32)
            .unwrap();
        let cid = builder.sum(DAG_PB_CODE, b"tiny").unwrap();
        assert_eq!(cid.version(), Version::V1);
        assert_eq!(cid.codec(), DAG_PB_CODE);
    }

    #[test]
    fn inline_limit_bounds() {
        let builder = CidBuilder::new(Version::V1, SHA_256_CODE).unwrap();
        assert!(matches!(
            builder.with_inline_limit(65),
            Err(Error::InvalidInlineLimit(65))
        ));
        assert_eq!(builder.with_inline_limit(0).unwrap().inline_limit(), None);
    }
}
