//! Streaming content digests.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use golink_storage::BackendHandle;
use std::io::{ErrorKind as IoErrorKind, Read};
use std::path::Path;

/// Hashing never holds more than this much of a file in memory.
pub const BUFFER_SIZE: usize = 64 * 1024;

/// Lower-case hex BLAKE3 digest plus the number of bytes it covers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Digest {
    pub hex: String,
    pub size: u64,
}

/// Hash everything `reader` yields. Blocking.
pub fn hash_reader<R: Read + ?Sized>(reader: &mut R) -> Result<Digest> {
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut size: u64 = 0;
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == IoErrorKind::Interrupted => continue,
            Err(err) => return Err(err).or_raise(|| ErrorKind::HashFailed),
        };
        hasher.update(&buffer[..read]);
        size += read as u64;
    }
    Ok(Digest { hex: hasher.finalize().to_hex().to_string(), size })
}

/// Hash a file in `backend` on the blocking thread pool.
pub async fn hash_stored(backend: &BackendHandle, path: &Path) -> Result<Digest> {
    let mut reader = backend.reader(path).await.or_raise(|| ErrorKind::HashFailed)?;
    tokio::task::spawn_blocking(move || hash_reader(&mut reader))
        .await
        .or_raise(|| ErrorKind::HashFailed)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use golink_storage::backend::MockBackend;
    use rstest::rstest;
    use std::io::{self, Cursor};
    use std::sync::Arc;

    struct Broken;
    impl Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("disk on fire"))
        }
    }

    #[rstest]
    #[case(b"".as_slice(), "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262")]
    #[case(b"hello world".as_slice(), "d74981efa70a0c880b8d8c1985d075dbcbf679b99a5f9914e5aaf96b831a9e24")]
    fn test_known_digests(#[case] input: &[u8], #[case] expected: &str) {
        let digest = hash_reader(&mut Cursor::new(input)).unwrap();
        assert_eq!(digest.hex, expected);
        assert_eq!(digest.size, input.len() as u64);
    }

    #[test]
    fn test_matches_one_shot_hash_across_buffers() {
        // Spans several buffer refills with a ragged tail.
        let data: Vec<u8> = (0..(BUFFER_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        let digest = hash_reader(&mut Cursor::new(&data)).unwrap();
        assert_eq!(digest.hex, blake3::hash(&data).to_hex().to_string());
        assert_eq!(digest.size, data.len() as u64);
        assert_eq!(hash_reader(&mut Cursor::new(&data)).unwrap(), digest);
    }

    #[test]
    fn test_read_error() {
        let err = hash_reader(&mut Broken).unwrap_err();
        assert!(matches!(&*err, ErrorKind::HashFailed));
    }

    #[tokio::test]
    async fn test_hash_stored() {
        let backend: BackendHandle = Arc::new(MockBackend::with_files([("docs/report.pdf", b"hello world".as_slice())]));
        let digest = hash_stored(&backend, Path::new("docs/report.pdf")).await.unwrap();
        assert_eq!(digest.size, 11);
        assert_eq!(digest.hex, blake3::hash(b"hello world").to_hex().to_string());
        let err = hash_stored(&backend, Path::new("missing")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::HashFailed));
    }
}
