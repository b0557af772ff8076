//! Randomness and comparison primitives for bearer secrets and disk keys
//!
//! Everything here draws from the OS CSPRNG. Secret comparison must never
//! short-circuit on the first differing byte.

use rand::rngs::OsRng;
use rand::RngCore;

/// Entropy of a node bearer secret (256 bits)
pub const SECRET_BYTES: usize = 32;

/// Size of an escrowed disk key (256 bits)
pub const DISK_KEY_BYTES: usize = 32;

/// Generate cryptographically secure random bytes.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Compare two byte strings without data-dependent early exit.
///
/// Lengths are compared first; the length of a bearer secret is public
/// (it is fixed by the encoding), only its content is sensitive.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }

    std::hint::black_box(diff) == 0
}
