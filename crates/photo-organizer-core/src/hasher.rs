//! Content fingerprinting.
//!
//! Files are streamed through BLAKE3 in fixed-size chunks, so memory use is
//! bounded regardless of file size. The fingerprint depends only on the bytes,
//! never on the path or name.
use crate::error::{Error, Result};
use crate::types::Fingerprint;

use std::{fs::File, io::Read, path::Path};

/// Read buffer size
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Compute the fingerprint of a file using the Blake3 algorithm
pub fn fingerprint<P: AsRef<Path>>(path: P) -> Result<Fingerprint> {
    let path = path.as_ref();
    let hash_error = |source| Error::Hash {
        path: path.to_path_buf(),
        source,
    };

    // Open the file with explicit scope to ensure it's closed promptly
    let hash = {
        let mut file = File::open(path).map_err(hash_error)?;

        let mut hasher = blake3::Hasher::new();

        let mut buffer = vec![0u8; CHUNK_SIZE];
        loop {
            let bytes_read = match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(hash_error(e)),
            };
            hasher.update(&buffer[..bytes_read]);
        }

        hasher.finalize()
    };

    Ok(hash.into())
}

/// Fingerprint of in-memory content
pub fn fingerprint_bytes(bytes: &[u8]) -> Fingerprint {
    blake3::hash(bytes).into()
}
