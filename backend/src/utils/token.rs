//! Opaque token generation for email verification and password reset.

use rand::RngCore;

/// Generates a single-use opaque token: 32 random bytes, hex encoded.
///
/// 256 bits of entropy from the thread-local CSPRNG, yielding a 64 character
/// string that is safe to embed in a URL.
pub fn generate_opaque_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
