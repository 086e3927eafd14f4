//! Content-addressed checksums.
//!
//! A [`Checksum`] is opaque to the rest of the crate: the diff engine only
//! ever compares two of them for equality or asks an accessor to compute a
//! fresh one. Streaming the hash (rather than loading a whole file into
//! memory) keeps memory use flat regardless of file size.

use std::fmt;
use std::io::{self, Read};

use data_encoding::BASE32_DNSSEC as BASE32HEX;
use sha2::{Digest, Sha256, digest::Output};

type Sha256Digest = Output<Sha256>;

/// A SHA-256 content digest.
///
/// This is an internal implementation choice, not a user-facing algorithm
/// knob: callers never select or negotiate a hash function, they just get
/// two checksums to compare.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Checksum(Sha256Digest);

#[cfg(feature = "serde")]
impl serde::Serialize for Checksum {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE32HEX.encode(&self.0))
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Checksum {
    fn deserialize<D>(deserializer: D) -> Result<Checksum, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error as _;
        let s = String::deserialize(deserializer)?;
        let bytes = BASE32HEX
            .decode(s.as_bytes())
            .map_err(|e| D::Error::custom(format!("invalid base32 checksum: {e}")))?;
        Self::from_slice(&bytes).map_err(|e| D::Error::custom(e.to_string()))
    }
}

/// The byte slice handed to [`Checksum::from_slice`] was not a valid SHA-256
/// digest length.
#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
#[error("checksum requires {expected} bytes, got {actual}")]
pub struct InvalidChecksumLength {
    expected: usize,
    actual: usize,
}

/// Hashing a stream failed because the underlying reader failed mid-read.
///
/// Rare in practice: by the time a file is being hashed, it has usually
/// already been opened successfully. This exists for the case where the
/// underlying storage fails partway through the read rather than at open.
#[derive(Debug, thiserror::Error)]
#[error("failed to compute checksum: {0}")]
pub struct ChecksumError(#[from] io::Error);

impl ChecksumError {
    /// Unwraps the I/O failure that interrupted hashing.
    #[must_use]
    pub fn into_io_error(self) -> io::Error {
        self.0
    }
}

impl Checksum {
    /// Hashes a byte slice directly, without going through an accessor.
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes))
    }

    /// Streams `reader` to completion and returns its checksum.
    ///
    /// Reads in fixed-size chunks so a caller can hash an arbitrarily large
    /// file without holding it entirely in memory.
    pub fn of_reader<R: Read>(mut reader: R) -> Result<Self, ChecksumError> {
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(Self(hasher.finalize()))
    }

    /// Reconstructs a checksum from its raw bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, InvalidChecksumLength> {
        if bytes.len() != 32 {
            return Err(InvalidChecksumLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        Ok(Self(*Sha256Digest::from_slice(bytes)))
    }

    /// The raw digest bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({})", BASE32HEX.encode(&self.0))
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", BASE32HEX.encode(&self.0))
    }
}

/// A [`Read`] wrapper that hashes every byte that passes through it.
///
/// Lets an accessor compute a file's checksum in the same pass it copies or
/// otherwise streams the file, instead of reading it twice.
pub struct HashingReader<R> {
    inner: R,
    hasher: Sha256,
}

impl<R: Read> HashingReader<R> {
    /// Wraps `inner`, hashing every byte subsequently read through it.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    /// Consumes the wrapper, returning the checksum of everything read so
    /// far and the wrapped reader.
    #[must_use]
    pub fn finalize(self) -> (Checksum, R) {
        (Checksum(self.hasher.finalize()), self.inner)
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = self.inner.read(buf)?;
        self.hasher.update(&buf[..count]);
        Ok(count)
    }
}
