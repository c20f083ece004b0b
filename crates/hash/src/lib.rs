#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Checksum handling for rapt
//!
//! APT declares one digest per archive in its uri-list output, as an
//! `ALGO:hexvalue` string. This crate parses those strings and computes
//! file digests for integrity verification before a downloaded archive is
//! promoted into the package cache.

use blake2::Blake2b512;
use digest::{Digest as _, DynDigest};
use md5::Md5;
use rapt_errors::{Error, HashError};
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use std::fmt;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Size of chunks for streaming digest computation
const CHUNK_SIZE: usize = 64 * 1024; // 64KB

/// A digest algorithm APT may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Md5,
    Sha1,
    Sha256,
    Sha512,
    Blake2b,
}

impl Algorithm {
    /// Parse an algorithm token, case-insensitively. `MD5SUM` is a
    /// historical alias for `MD5`.
    #[must_use]
    pub fn parse_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "md5" | "md5sum" => Some(Self::Md5),
            "sha1" => Some(Self::Sha1),
            "sha256" => Some(Self::Sha256),
            "sha512" => Some(Self::Sha512),
            "blake2b" => Some(Self::Blake2b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
            Self::Blake2b => "BLAKE2b",
        }
    }

    fn hasher(self) -> Box<dyn DynDigest + Send> {
        match self {
            Self::Md5 => Box::new(Md5::new()),
            Self::Sha1 => Box::new(Sha1::new()),
            Self::Sha256 => Box::new(Sha256::new()),
            Self::Sha512 => Box::new(Sha512::new()),
            Self::Blake2b => Box::new(Blake2b512::new()),
        }
    }

    /// Compute this digest over a byte slice
    #[must_use]
    pub fn hash_data(self, data: &[u8]) -> Vec<u8> {
        let mut hasher = self.hasher();
        hasher.update(data);
        hasher.finalize().to_vec()
    }

    /// Compute this digest over a file, streaming in chunks
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or read.
    pub async fn hash_file(self, path: &Path) -> Result<Vec<u8>, Error> {
        let mut file = File::open(path)
            .await
            .map_err(|e| Error::io_with_path(&e, path))?;

        let mut hasher = self.hasher();
        let mut buffer = vec![0; CHUNK_SIZE];

        loop {
            let n = file.read(&mut buffer).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }

        Ok(hasher.finalize().to_vec())
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A declared checksum: algorithm plus decoded digest value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    algorithm: Algorithm,
    bytes: Vec<u8>,
}

impl Digest {
    /// Parse a declared `ALGO:hexvalue` checksum string.
    ///
    /// A string without a recognized `ALGO:` prefix is taken as a bare MD5
    /// hex value. The declared value is decoded but not length-checked:
    /// a well-formed hex string of the wrong width simply never matches,
    /// which surfaces as a checksum mismatch at verification time.
    ///
    /// # Errors
    /// Returns [`HashError::UnknownAlgorithm`] for a colon-prefixed but
    /// unrecognized algorithm token, and [`HashError::InvalidHex`] when the
    /// value is not valid hexadecimal.
    pub fn parse(s: &str) -> Result<Self, HashError> {
        let (algorithm, value) = match s.split_once(':') {
            Some((token, value)) => {
                let algorithm =
                    Algorithm::parse_token(token).ok_or_else(|| HashError::UnknownAlgorithm {
                        token: token.to_string(),
                    })?;
                (algorithm, value)
            }
            None => (Algorithm::Md5, s),
        };

        let bytes = hex::decode(value).map_err(|_| HashError::InvalidHex {
            value: value.to_string(),
        })?;

        Ok(Self { algorithm, bytes })
    }

    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Hex form of the declared value
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Exact comparison against a computed digest value
    #[must_use]
    pub fn matches(&self, actual: &[u8]) -> bool {
        self.bytes == actual
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.to_hex())
    }
}

/// Verify a file against a declared digest, returning the computed value
/// on mismatch so callers can report both sides.
///
/// # Errors
/// Returns [`HashError::Mismatch`] when the computed digest differs, or an
/// I/O error if the file cannot be read.
pub async fn verify_file(path: &Path, name: &str, expected: &Digest) -> Result<(), Error> {
    let actual = expected.algorithm().hash_file(path).await?;
    if expected.matches(&actual) {
        Ok(())
    } else {
        Err(HashError::Mismatch {
            name: name.to_string(),
            expected: expected.to_string(),
            actual: hex::encode(actual),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_known_vectors() {
        let data = b"hello world";
        assert_eq!(
            hex::encode(Algorithm::Md5.hash_data(data)),
            "5eb63bbbe01eeed093cb22bb8f5acdc3"
        );
        assert_eq!(
            hex::encode(Algorithm::Sha1.hash_data(data)),
            "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed"
        );
        assert_eq!(
            hex::encode(Algorithm::Sha256.hash_data(data)),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_parse_prefixed() {
        let digest = Digest::parse("SHA256:deadbeef").unwrap();
        assert_eq!(digest.algorithm(), Algorithm::Sha256);
        assert_eq!(digest.to_hex(), "deadbeef");
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(
            Digest::parse("sha512:00ff").unwrap().algorithm(),
            Algorithm::Sha512
        );
        assert_eq!(
            Digest::parse("Blake2b:00ff").unwrap().algorithm(),
            Algorithm::Blake2b
        );
        assert_eq!(
            Digest::parse("MD5Sum:00ff").unwrap().algorithm(),
            Algorithm::Md5
        );
    }

    #[test]
    fn test_parse_bare_value_defaults_to_md5() {
        let digest = Digest::parse("5eb63bbbe01eeed093cb22bb8f5acdc3").unwrap();
        assert_eq!(digest.algorithm(), Algorithm::Md5);
        assert!(digest.matches(&Algorithm::Md5.hash_data(b"hello world")));
    }

    #[test]
    fn test_parse_unknown_algorithm() {
        assert!(matches!(
            Digest::parse("CRC32:deadbeef"),
            Err(HashError::UnknownAlgorithm { token }) if token == "CRC32"
        ));
    }

    #[test]
    fn test_parse_invalid_hex() {
        assert!(matches!(
            Digest::parse("SHA256:not-hex"),
            Err(HashError::InvalidHex { .. })
        ));
    }

    #[tokio::test]
    async fn test_verify_file_match() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"hello world").unwrap();

        let digest = Digest::parse("MD5:5eb63bbbe01eeed093cb22bb8f5acdc3").unwrap();
        verify_file(temp.path(), "test.deb", &digest).await.unwrap();
    }

    #[tokio::test]
    async fn test_verify_file_mismatch_reports_both_sides() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"corrupted content").unwrap();

        let digest = Digest::parse("SHA256:deadbeef").unwrap();
        let err = verify_file(temp.path(), "test.deb", &digest)
            .await
            .unwrap_err();
        match err {
            Error::Hash(HashError::Mismatch {
                name,
                expected,
                actual,
            }) => {
                assert_eq!(name, "test.deb");
                assert_eq!(expected, "SHA256:deadbeef");
                assert_eq!(actual.len(), 64);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
