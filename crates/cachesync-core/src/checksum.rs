//! Checksum verification of local files.
//!
//! Digests are computed by streaming the file in fixed-size chunks, so memory
//! use stays bounded for large files. A mismatch is a normal `false`; only read
//! failures are errors.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

use crate::error::{DigestParseError, VerifyError};

const BUF_SIZE: usize = 64 * 1024;

/// Supported digest algorithms. `None` disables content checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    #[default]
    None,
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl ChecksumAlgorithm {
    pub fn name(self) -> &'static str {
        match self {
            ChecksumAlgorithm::None => "none",
            ChecksumAlgorithm::Md5 => "md5",
            ChecksumAlgorithm::Sha1 => "sha1",
            ChecksumAlgorithm::Sha256 => "sha256",
            ChecksumAlgorithm::Sha512 => "sha512",
        }
    }

    /// Length of the lowercase hex digest (0 for `None`).
    pub fn hex_len(self) -> usize {
        match self {
            ChecksumAlgorithm::None => 0,
            ChecksumAlgorithm::Md5 => 32,
            ChecksumAlgorithm::Sha1 => 40,
            ChecksumAlgorithm::Sha256 => 64,
            ChecksumAlgorithm::Sha512 => 128,
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = DigestParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "").as_str() {
            "none" => Ok(ChecksumAlgorithm::None),
            "md5" => Ok(ChecksumAlgorithm::Md5),
            "sha1" => Ok(ChecksumAlgorithm::Sha1),
            "sha256" => Ok(ChecksumAlgorithm::Sha256),
            "sha512" => Ok(ChecksumAlgorithm::Sha512),
            _ => Err(DigestParseError::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// Expected digest of a synchronized file. The algorithm is never `None`;
/// "no digest" is modelled as `Option<ExpectedDigest>::None` by callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedDigest {
    algorithm: ChecksumAlgorithm,
    hex: String,
}

impl ExpectedDigest {
    /// Returns `None` when `algorithm` is [`ChecksumAlgorithm::None`].
    pub fn new(algorithm: ChecksumAlgorithm, hex: impl Into<String>) -> Option<Self> {
        if algorithm == ChecksumAlgorithm::None {
            return None;
        }
        Some(Self {
            algorithm,
            hex: hex.into(),
        })
    }

    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Parse `"sha256:9f86d0..."`. `"none"` yields `Ok(None)`.
    pub fn parse(s: &str) -> Result<Option<Self>, DigestParseError> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("none") {
            return Ok(None);
        }
        let (alg, value) = s
            .split_once(':')
            .ok_or_else(|| DigestParseError::MissingAlgorithm(s.to_string()))?;
        let algorithm: ChecksumAlgorithm = alg.parse()?;
        if algorithm == ChecksumAlgorithm::None {
            return Ok(None);
        }
        let value = value.trim();
        if value.len() != algorithm.hex_len() || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(DigestParseError::BadValue {
                algorithm: algorithm.name(),
                expected: algorithm.hex_len(),
                actual: value.to_string(),
            });
        }
        Ok(Self::new(algorithm, value))
    }

    /// Whether the file at `path` matches this digest.
    pub fn matches(&self, path: &Path) -> Result<bool, VerifyError> {
        verify_path(path, self.algorithm, &self.hex)
    }
}

impl fmt::Display for ExpectedDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

fn hash_file<D: Digest>(path: &Path) -> Result<String, VerifyError> {
    let read_err = |source| VerifyError::Read {
        path: path.to_path_buf(),
        source,
    };
    let mut f = File::open(path).map_err(read_err)?;
    let mut hasher = D::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = f.read(&mut buf).map_err(read_err)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Compute the digest of a file as lowercase hex.
///
/// `ChecksumAlgorithm::None` does not read the file and returns an empty string.
pub fn digest_path(path: &Path, algorithm: ChecksumAlgorithm) -> Result<String, VerifyError> {
    match algorithm {
        ChecksumAlgorithm::None => Ok(String::new()),
        ChecksumAlgorithm::Md5 => hash_file::<Md5>(path),
        ChecksumAlgorithm::Sha1 => hash_file::<Sha1>(path),
        ChecksumAlgorithm::Sha256 => hash_file::<Sha256>(path),
        ChecksumAlgorithm::Sha512 => hash_file::<Sha512>(path),
    }
}

/// Compare the file's digest with `expected_hex`, ignoring ASCII case.
pub fn verify_path(
    path: &Path,
    algorithm: ChecksumAlgorithm,
    expected_hex: &str,
) -> Result<bool, VerifyError> {
    let actual = digest_path(path, algorithm)?;
    Ok(actual.eq_ignore_ascii_case(expected_hex.trim()))
}

/// SHA-256 shorthand.
pub fn sha256_path(path: &Path) -> Result<String, VerifyError> {
    digest_path(path, ChecksumAlgorithm::Sha256)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HELLO_SHA256: &str = "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03";

    fn hello_file() -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello\n").unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn sha256_path_empty_file() {
        let f = tempfile::NamedTempFile::new().unwrap();
        let digest = sha256_path(f.path()).unwrap();
        assert_eq!(
            digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn known_digests_for_each_algorithm() {
        let f = hello_file();
        let path = f.path();
        assert_eq!(
            digest_path(path, ChecksumAlgorithm::Md5).unwrap(),
            "b1946ac92492d2347c6235b4d2611184"
        );
        assert_eq!(
            digest_path(path, ChecksumAlgorithm::Sha1).unwrap(),
            "f572d396fae9206628714fb2ce00f72e94f2258f"
        );
        assert_eq!(digest_path(path, ChecksumAlgorithm::Sha256).unwrap(), HELLO_SHA256);
        assert_eq!(digest_path(path, ChecksumAlgorithm::Sha512).unwrap().len(), 128);
        assert_eq!(digest_path(path, ChecksumAlgorithm::None).unwrap(), "");
    }

    #[test]
    fn verify_is_case_insensitive() {
        let f = hello_file();
        let upper = HELLO_SHA256.to_ascii_uppercase();
        assert!(verify_path(f.path(), ChecksumAlgorithm::Sha256, &upper).unwrap());
        assert!(!verify_path(f.path(), ChecksumAlgorithm::Sha256, &"0".repeat(64)).unwrap());
    }

    #[test]
    fn missing_file_is_an_error_not_a_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.bin");
        let err = verify_path(&missing, ChecksumAlgorithm::Md5, "abc").unwrap_err();
        assert!(matches!(err, VerifyError::Read { .. }));
    }

    #[test]
    fn parse_expected_digest() {
        let d = ExpectedDigest::parse(&format!("SHA-256:{}", HELLO_SHA256))
            .unwrap()
            .unwrap();
        assert_eq!(d.algorithm(), ChecksumAlgorithm::Sha256);
        assert_eq!(d.to_string(), format!("sha256:{}", HELLO_SHA256));
        assert_eq!(ExpectedDigest::parse("none").unwrap(), None);
        assert!(matches!(
            ExpectedDigest::parse("crc32:deadbeef"),
            Err(DigestParseError::UnknownAlgorithm(_))
        ));
        assert!(matches!(
            ExpectedDigest::parse("md5:xyz"),
            Err(DigestParseError::BadValue { expected: 32, .. })
        ));
        assert!(matches!(
            ExpectedDigest::parse(HELLO_SHA256),
            Err(DigestParseError::MissingAlgorithm(_))
        ));
    }

    #[test]
    fn expected_digest_none_algorithm_is_absent() {
        assert!(ExpectedDigest::new(ChecksumAlgorithm::None, "").is_none());
    }
}
