//! Session id generation.

use rand::rngs::OsRng;
use rand::RngCore;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generate an unguessable alphanumeric id of `len` characters from the OS
/// entropy source.
pub fn generate(len: usize) -> Result<String, rand::Error> {
    // 248 is the largest multiple of 62 below 256; rejecting bytes above it
    // keeps the distribution uniform.
    const LIMIT: u8 = (u8::MAX / ALPHABET.len() as u8) * ALPHABET.len() as u8;

    let mut id = String::with_capacity(len);
    let mut buf = [0u8; 32];

    while id.len() < len {
        OsRng.try_fill_bytes(&mut buf)?;
        for &b in buf.iter().filter(|&&b| b < LIMIT) {
            if id.len() == len {
                break;
            }
            id.push(ALPHABET[(b as usize) % ALPHABET.len()] as char);
        }
    }

    Ok(id)
}
