//! Content hashing with blake3.
//!
//! Used for service worker precache revisions and icon cache-busting query
//! strings.
//!
//! ```ignore
//! let revision = hash::revision(&bytes);   // 32 hex chars
//! let short = hash::fingerprint(&bytes);   // 8 hex chars
//! ```

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Full blake3 digest as hex.
#[inline]
pub fn digest<T: AsRef<[u8]> + ?Sized>(data: &T) -> String {
    blake3::hash(data.as_ref()).to_hex().to_string()
}

/// Precache revision: the first 128 bits of the digest.
#[inline]
pub fn revision<T: AsRef<[u8]> + ?Sized>(data: &T) -> String {
    hex::encode(&blake3::hash(data.as_ref()).as_bytes()[..16])
}

/// 8-char fingerprint for cache-busting query strings.
#[inline]
pub fn fingerprint<T: AsRef<[u8]> + ?Sized>(data: &T) -> String {
    hex::encode(&blake3::hash(data.as_ref()).as_bytes()[..4])
}

/// Stream a file through blake3 and return its revision.
pub fn file_revision(path: &Path) -> io::Result<String> {
    let mut reader = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; 8192];
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hex::encode(&hasher.finalize().as_bytes()[..16]))
}
