//! Identifier derivation
//!
//! Entry ids are content addressed: the same (payload, name) pair always
//! yields the same id, so storing it twice is rejected as a duplicate.
//!
//! ```text
//! id = first 128 bits of
//!      SHA256( hex(SHA256(payload)) ‖ hex(SHA256(name)) ‖ hex(SHA256(len as decimal)) )
//! ```

use std::io::{self, Read};

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::Result;

/// Derive the id of `payload` stored under `name`
///
/// Consumes `payload` to the end and also returns its length.
pub fn derive_id<R: Read + ?Sized>(name: &str, payload: &mut R) -> Result<(Uuid, u64)> {
    let mut hasher = Sha256::new();
    let length = io::copy(payload, &mut hasher)?;
    let payload_digest = hex::encode(hasher.finalize());

    Ok((combine(&payload_digest, name, length), length))
}

/// Derive the id of an in-memory payload
pub fn derive_id_from_bytes(name: &str, payload: &[u8]) -> Uuid {
    let payload_digest = hex::encode(Sha256::digest(payload));
    combine(&payload_digest, name, payload.len() as u64)
}

fn combine(payload_digest: &str, name: &str, length: u64) -> Uuid {
    let name_digest = hex::encode(Sha256::digest(name.as_bytes()));
    let length_digest = hex::encode(Sha256::digest(length.to_string().as_bytes()));

    let mut hasher = Sha256::new();
    hasher.update(payload_digest.as_bytes());
    hasher.update(name_digest.as_bytes());
    hasher.update(length_digest.as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}
