//! Streaming whole-file hashing.
//!
//! The file is read in fixed-size chunks and fed to a [`StreamingDigest`], so
//! memory use does not depend on file size. The digest does not depend on the
//! chunk size either: identical bytes always give the same hex string.
//!
//! # Example
//!
//! ```no_run
//! use vidguard::{DigestAlgorithm, hash_file};
//!
//! let hex = hash_file("input.mp4", DigestAlgorithm::Md5)?;
//! assert_eq!(hex.len(), 32);
//! # Ok::<(), vidguard::VidGuardError>(())
//! ```

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::File,
    io::{ErrorKind as IoErrorKind, Read},
    path::Path,
    str::FromStr,
};

use sha2::{Digest, Sha256};

use crate::{
    configuration::AnalysisConfig,
    error::VidGuardError,
    progress::{CancellationToken, OperationType},
};

/// Default read size for [`hash_file`].
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DigestAlgorithm {
    /// MD5, 32 hex characters. The default, for compatibility with existing
    /// reports.
    #[default]
    Md5,
    /// SHA-256, 64 hex characters.
    Sha256,
    /// BLAKE3, 64 hex characters.
    Blake3,
}

impl DigestAlgorithm {
    /// Lowercase name, as accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "md5",
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Blake3 => "blake3",
        }
    }

    /// Length of the hex-encoded digest.
    pub fn hex_len(self) -> usize {
        match self {
            DigestAlgorithm::Md5 => 32,
            DigestAlgorithm::Sha256 | DigestAlgorithm::Blake3 => 64,
        }
    }

    fn new_digest(self) -> Box<dyn StreamingDigest> {
        match self {
            DigestAlgorithm::Md5 => Box::new(Md5Digest(md5::Context::new())),
            DigestAlgorithm::Sha256 => Box::new(Sha256Digest(Sha256::new())),
            DigestAlgorithm::Blake3 => Box::new(Blake3Digest(blake3::Hasher::new())),
        }
    }
}

impl Display for DigestAlgorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = VidGuardError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "md5" => Ok(DigestAlgorithm::Md5),
            "sha256" | "sha-256" => Ok(DigestAlgorithm::Sha256),
            "blake3" => Ok(DigestAlgorithm::Blake3),
            other => Err(VidGuardError::InvalidConfiguration(format!(
                "unknown digest algorithm: {other}"
            ))),
        }
    }
}

/// Capability interface over an incremental hash function.
pub trait StreamingDigest: Send {
    /// Absorb the next chunk of input.
    fn update(&mut self, chunk: &[u8]);
    /// Consume the digest and return it as lowercase hex.
    fn finalize_hex(self: Box<Self>) -> String;
}

struct Md5Digest(md5::Context);
struct Sha256Digest(Sha256);
struct Blake3Digest(blake3::Hasher);

impl StreamingDigest for Md5Digest {
    fn update(&mut self, chunk: &[u8]) {
        self.0.consume(chunk);
    }

    fn finalize_hex(self: Box<Self>) -> String {
        format!("{:x}", self.0.compute())
    }
}

impl StreamingDigest for Sha256Digest {
    fn update(&mut self, chunk: &[u8]) {
        Digest::update(&mut self.0, chunk);
    }

    fn finalize_hex(self: Box<Self>) -> String {
        hex::encode(self.0.finalize())
    }
}

impl StreamingDigest for Blake3Digest {
    fn update(&mut self, chunk: &[u8]) {
        self.0.update(chunk);
    }

    fn finalize_hex(self: Box<Self>) -> String {
        self.0.finalize().to_hex().to_string()
    }
}

/// An in-progress hash: `start`, then `feed` chunks, then `finish`.
pub struct HashAccumulator {
    digest: Box<dyn StreamingDigest>,
    bytes_fed: u64,
}

impl HashAccumulator {
    /// Start hashing with a built-in algorithm.
    pub fn start(algorithm: DigestAlgorithm) -> Self {
        Self::with_digest(algorithm.new_digest())
    }

    /// Start hashing with a caller-supplied digest implementation.
    pub fn with_digest(digest: Box<dyn StreamingDigest>) -> Self {
        Self {
            digest,
            bytes_fed: 0,
        }
    }

    /// Feed the next chunk of bytes.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.digest.update(chunk);
        self.bytes_fed += chunk.len() as u64;
    }

    /// Total bytes fed so far.
    pub fn bytes_fed(&self) -> u64 {
        self.bytes_fed
    }

    /// Finish and return the lowercase hex digest.
    pub fn finish(self) -> String {
        self.digest.finalize_hex()
    }
}

/// Hash a whole file with the default chunk size.
///
/// # Errors
///
/// [`VidGuardError::SourceUnavailable`] if the file cannot be opened,
/// [`VidGuardError::IoFailure`] if a read fails part-way through.
pub fn hash_file<P: AsRef<Path>>(path: P, algorithm: DigestAlgorithm) -> Result<String, VidGuardError> {
    let config = AnalysisConfig::new().with_digest_algorithm(algorithm);
    hash_file_with_config(path.as_ref(), &config)
}

/// Hash a whole file using the algorithm, chunk size, progress callback and
/// cancellation token from `config`.
pub fn hash_file_with_config(path: &Path, config: &AnalysisConfig) -> Result<String, VidGuardError> {
    hash_file_until(path, config, None)
}

/// Like [`hash_file_with_config`], additionally stopping with
/// [`VidGuardError::Cancelled`] as soon as `stop` is cancelled.
pub(crate) fn hash_file_until(
    path: &Path,
    config: &AnalysisConfig,
    stop: Option<&CancellationToken>,
) -> Result<String, VidGuardError> {
    let file = File::open(path).map_err(|error| VidGuardError::SourceUnavailable {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })?;
    let total = file.metadata().ok().map(|metadata| metadata.len());

    let mut tracker = config.tracker(OperationType::Hashing, total);
    let mut accumulator = HashAccumulator::start(config.digest_algorithm);

    hash_reader(file, &mut accumulator, config.chunk_size, |read| {
        if config.is_cancelled() || stop.is_some_and(CancellationToken::is_cancelled) {
            return Err(VidGuardError::Cancelled);
        }
        tracker.advance_by(read as u64, None);
        Ok(())
    })?;
    tracker.finish();

    log::debug!(
        "Hashed {} bytes of {} with {}",
        accumulator.bytes_fed(),
        path.display(),
        config.digest_algorithm,
    );

    Ok(accumulator.finish())
}

/// Drive `reader` to EOF in `chunk_size` reads, feeding every chunk.
///
/// `after_chunk` runs after each chunk with its length and may abort the
/// read by returning an error. On error the accumulator holds a partial
/// digest and must be discarded.
pub(crate) fn hash_reader<R, F>(
    mut reader: R,
    accumulator: &mut HashAccumulator,
    chunk_size: usize,
    mut after_chunk: F,
) -> Result<(), VidGuardError>
where
    R: Read,
    F: FnMut(usize) -> Result<(), VidGuardError>,
{
    let mut buffer = vec![0_u8; chunk_size.max(1)];
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => return Ok(()),
            Ok(read) => read,
            Err(error) if error.kind() == IoErrorKind::Interrupted => continue,
            Err(error) => return Err(VidGuardError::io("hashing file contents", error)),
        };
        accumulator.feed(&buffer[..read]);
        after_chunk(read)?;
    }
}
