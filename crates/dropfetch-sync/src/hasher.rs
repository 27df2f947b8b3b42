//! Content hashing compatible with the Dropbox `content_hash` scheme
//!
//! The remote hash splits a file into 4 MiB blocks, hashes every block with
//! SHA-256, and hashes the concatenation of the block digests once more. The
//! ledger additionally keys every record on the plain SHA-256 of the file, so
//! [`ContentHasher`] computes both digests in a single pass.

use dropfetch_types::{Error, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Size of a content hash block
pub const BLOCK_SIZE: usize = 4 * 1024 * 1024;

/// Read buffer used by the file helpers
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Both digests of a byte stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigests {
    /// Lowercase hex Dropbox content hash
    pub content_hash: String,
    /// Lowercase hex SHA-256 of the whole stream
    pub sha256: String,
    /// Number of bytes hashed
    pub size: u64,
}

/// Incremental hasher producing [`FileDigests`]
///
/// Block boundaries depend only on the byte offset, never on how the input is
/// split across [`update`](Self::update) calls.
#[derive(Debug, Clone, Default)]
pub struct ContentHasher {
    block: Sha256,
    block_len: usize,
    block_digests: Sha256,
    whole: Sha256,
    size: u64,
}

impl ContentHasher {
    /// Create an empty hasher
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk of the stream
    pub fn update(&mut self, mut data: &[u8]) {
        self.whole.update(data);
        self.size += data.len() as u64;

        while !data.is_empty() {
            let take = (BLOCK_SIZE - self.block_len).min(data.len());
            self.block.update(&data[..take]);
            self.block_len += take;
            data = &data[take..];

            if self.block_len == BLOCK_SIZE {
                self.flush_block();
            }
        }
    }

    /// Number of bytes fed so far
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Consume the hasher and produce both digests
    pub fn finalize(mut self) -> FileDigests {
        if self.block_len > 0 {
            self.flush_block();
        }

        FileDigests {
            content_hash: hex::encode(self.block_digests.finalize()),
            sha256: hex::encode(self.whole.finalize()),
            size: self.size,
        }
    }

    fn flush_block(&mut self) {
        let digest = std::mem::take(&mut self.block).finalize();
        self.block_digests.update(digest);
        self.block_len = 0;
    }
}

/// Dropbox content hash of an in-memory buffer
pub fn content_hash(data: &[u8]) -> String {
    let mut hasher = ContentHasher::new();
    hasher.update(data);
    hasher.finalize().content_hash
}

/// Hash everything an async reader yields
pub async fn hash_reader<R>(reader: &mut R) -> std::io::Result<FileDigests>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut hasher = ContentHasher::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = reader.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hasher.finalize())
}

/// Hash a local file
pub async fn hash_file<P: AsRef<Path>>(path: P) -> Result<FileDigests> {
    let path = path.as_ref();
    let mut file = File::open(path)
        .await
        .map_err(|e| Error::path(path, format!("Failed to open for hashing: {}", e)))?;

    hash_reader(&mut file)
        .await
        .map_err(|e| Error::path(path, format!("Failed to read for hashing: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    /// Straightforward reference: hash every block, then the concatenation
    fn reference_content_hash(data: &[u8]) -> String {
        let concatenated: Vec<u8> = data
            .chunks(BLOCK_SIZE)
            .flat_map(|block| Sha256::digest(block).to_vec())
            .collect();
        hex::encode(Sha256::digest(&concatenated))
    }

    fn pattern(len: usize, seed: u8) -> Vec<u8> {
        (0..len)
            .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
            .collect()
    }

    #[test]
    fn test_empty_input() {
        let digests = ContentHasher::new().finalize();
        assert_eq!(digests.content_hash, EMPTY_SHA256);
        assert_eq!(digests.sha256, EMPTY_SHA256);
        assert_eq!(digests.size, 0);
    }

    #[test]
    fn test_small_input_is_hash_of_single_block_digest() {
        let single = Sha256::digest(b"hello");
        let expected = hex::encode(Sha256::digest(single));

        assert_eq!(content_hash(b"hello"), expected);
    }

    #[test]
    fn test_whole_file_sha256() {
        let data = pattern(BLOCK_SIZE + 17, 3);
        let mut hasher = ContentHasher::new();
        hasher.update(&data);
        let digests = hasher.finalize();

        assert_eq!(digests.sha256, hex::encode(Sha256::digest(&data)));
        assert_eq!(digests.size, data.len() as u64);
        assert_ne!(digests.sha256, digests.content_hash);
    }

    #[test]
    fn test_exact_block_multiples_have_no_trailing_block() {
        for blocks in 1..=2 {
            let data = pattern(blocks * BLOCK_SIZE, blocks as u8);

            let mut concatenated = Vec::new();
            for block in data.chunks(BLOCK_SIZE) {
                concatenated.extend_from_slice(&Sha256::digest(block));
            }
            assert_eq!(concatenated.len(), blocks * 32);

            assert_eq!(content_hash(&data), hex::encode(Sha256::digest(&concatenated)));
        }
    }

    #[tokio::test]
    async fn test_hash_file_matches_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        let data = pattern(BLOCK_SIZE + 4096, 11);
        tokio::fs::write(&path, &data).await.unwrap();

        let digests = hash_file(&path).await.unwrap();
        assert_eq!(digests.content_hash, reference_content_hash(&data));
        assert_eq!(digests.size, data.len() as u64);
    }

    #[tokio::test]
    async fn test_hash_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = hash_file(dir.path().join("absent")).await.unwrap_err();
        assert!(err.to_string().contains("absent"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(12))]

        #[test]
        fn prop_chunking_does_not_change_digests(
            len in (BLOCK_SIZE - 64)..(BLOCK_SIZE + 64),
            seed in any::<u8>(),
            chunk in 1usize..200_000,
        ) {
            let data = pattern(len, seed);

            let mut chunked = ContentHasher::new();
            for piece in data.chunks(chunk) {
                chunked.update(piece);
            }
            let mut whole = ContentHasher::new();
            whole.update(&data);

            let chunked = chunked.finalize();
            prop_assert_eq!(&chunked, &whole.finalize());
            prop_assert_eq!(chunked.content_hash, reference_content_hash(&data));
        }

        #[test]
        fn prop_small_inputs_match_reference(data in proptest::collection::vec(any::<u8>(), 0..4096)) {
            prop_assert_eq!(content_hash(&data), reference_content_hash(&data));
        }
    }
}
