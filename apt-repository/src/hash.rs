//! Cryptographic hashing support for APT repositories.

use crate::{AptRepositoryError, Result};
use sha2::Digest;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// Size of the chunks files are read in while hashing.
pub const CHUNK_SIZE: usize = 8192;

/// Supported hash algorithms for package archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// MD5 hash algorithm.
    Md5,
    /// SHA-1 hash algorithm.
    Sha1,
    /// SHA-256 hash algorithm.
    Sha256,
    /// SHA-512 hash algorithm.
    Sha512,
}

impl HashAlgorithm {
    /// Lowercase algorithm name, as accepted by [`FromStr`].
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha512 => "sha512",
        }
    }

    /// Field name used for this digest in a Packages stanza.
    pub fn field_name(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "MD5sum",
            HashAlgorithm::Sha1 => "SHA1",
            HashAlgorithm::Sha256 => "SHA256",
            HashAlgorithm::Sha512 => "SHA512",
        }
    }

    /// Get all supported hash algorithms.
    pub fn all() -> &'static [HashAlgorithm] {
        &[
            HashAlgorithm::Md5,
            HashAlgorithm::Sha1,
            HashAlgorithm::Sha256,
            HashAlgorithm::Sha512,
        ]
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = AptRepositoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "md5" => Ok(HashAlgorithm::Md5),
            "sha1" => Ok(HashAlgorithm::Sha1),
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha512" => Ok(HashAlgorithm::Sha512),
            _ => Err(AptRepositoryError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

/// A set of hex digests for a single file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HashSet {
    hashes: HashMap<HashAlgorithm, String>,
}

impl HashSet {
    /// Create a new empty hash set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a hash to the set.
    pub fn insert(&mut self, algorithm: HashAlgorithm, hash: String) {
        self.hashes.insert(algorithm, hash);
    }

    /// Get a hash by algorithm.
    pub fn get(&self, algorithm: &HashAlgorithm) -> Option<&str> {
        self.hashes.get(algorithm).map(|s| s.as_str())
    }

    /// Check if the hash set is empty.
    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Get the number of hashes in the set.
    pub fn len(&self) -> usize {
        self.hashes.len()
    }
}

/// Computes several digests over the same stream of data.
pub struct MultiHasher {
    md5: Option<md5::Context>,
    sha1: Option<sha1::Sha1>,
    sha256: Option<sha2::Sha256>,
    sha512: Option<sha2::Sha512>,
    size: u64,
}

impl MultiHasher {
    /// Create a new multi-hasher with the specified algorithms.
    pub fn new(algorithms: &[HashAlgorithm]) -> Self {
        let mut hasher = Self {
            md5: None,
            sha1: None,
            sha256: None,
            sha512: None,
            size: 0,
        };

        for &algorithm in algorithms {
            match algorithm {
                HashAlgorithm::Md5 => hasher.md5 = Some(md5::Context::new()),
                HashAlgorithm::Sha1 => hasher.sha1 = Some(sha1::Sha1::new()),
                HashAlgorithm::Sha256 => hasher.sha256 = Some(sha2::Sha256::new()),
                HashAlgorithm::Sha512 => hasher.sha512 = Some(sha2::Sha512::new()),
            }
        }

        hasher
    }

    /// Update the hashes with the given data.
    pub fn update(&mut self, data: &[u8]) {
        self.size += data.len() as u64;

        if let Some(ref mut hasher) = self.md5 {
            hasher.consume(data);
        }
        if let Some(ref mut hasher) = self.sha1 {
            hasher.update(data);
        }
        if let Some(ref mut hasher) = self.sha256 {
            hasher.update(data);
        }
        if let Some(ref mut hasher) = self.sha512 {
            hasher.update(data);
        }
    }

    /// Finalize the hashes and return the byte count and hex digests.
    pub fn finalize(self) -> (u64, HashSet) {
        let mut hash_set = HashSet::new();

        if let Some(hasher) = self.md5 {
            hash_set.insert(HashAlgorithm::Md5, format!("{:x}", hasher.compute()));
        }
        if let Some(hasher) = self.sha1 {
            hash_set.insert(HashAlgorithm::Sha1, hex::encode(hasher.finalize()));
        }
        if let Some(hasher) = self.sha256 {
            hash_set.insert(HashAlgorithm::Sha256, hex::encode(hasher.finalize()));
        }
        if let Some(hasher) = self.sha512 {
            hash_set.insert(HashAlgorithm::Sha512, hex::encode(hasher.finalize()));
        }

        (self.size, hash_set)
    }
}

/// Hash a reader in [`CHUNK_SIZE`] pieces with the specified algorithms.
pub fn hash_reader<R: Read>(
    mut reader: R,
    algorithms: &[HashAlgorithm],
) -> Result<(u64, HashSet)> {
    let mut hasher = MultiHasher::new(algorithms);
    let mut buffer = [0u8; CHUNK_SIZE];

    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        hasher.update(&buffer[..n]);
    }

    Ok(hasher.finalize())
}

/// Hash a file with the specified algorithms in a single pass.
pub fn hash_file<P: AsRef<Path>>(
    path: P,
    algorithms: &[HashAlgorithm],
) -> Result<(u64, HashSet)> {
    let file = File::open(path.as_ref())?;
    hash_reader(file, algorithms)
}

/// Compute the hex digest of a file under the named algorithm.
///
/// The algorithm name is resolved before the file is touched, so an unknown
/// name fails with [`AptRepositoryError::UnsupportedAlgorithm`] even when the
/// path does not exist.
pub fn digest_file<P: AsRef<Path>>(path: P, algorithm: &str) -> Result<String> {
    let algorithm: HashAlgorithm = algorithm.parse()?;
    let (_, hashes) = hash_file(path, &[algorithm])?;
    hashes
        .get(&algorithm)
        .map(|s| s.to_string())
        .ok_or_else(|| AptRepositoryError::UnsupportedAlgorithm(algorithm.to_string()))
}
