//! API key obfuscation (§4.1, §6, §9).
//!
//! XOR with a fixed salt, then base-64. This is explicitly **not**
//! encryption — it only prevents the key from being casually readable in a
//! plain-text config file. Anyone with file access can recover it.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

const SALT: &[u8] = b"meteor-mcp-gemini";

/// Obfuscate a plaintext API key for storage in the persisted blob.
#[must_use]
pub fn obfuscate(plaintext: &str) -> String {
    let xored: Vec<u8> = plaintext
        .bytes()
        .enumerate()
        .map(|(i, b)| b ^ SALT[i % SALT.len()])
        .collect();
    STANDARD.encode(xored)
}

/// Recover the plaintext API key from its obfuscated storage form.
///
/// Returns an empty string if `encoded` is empty, or if it is not valid
/// base64/UTF-8 — the config loader treats an unreadable key the same as a
/// missing one rather than failing the whole load (§4.1 "deserialization
/// never throws").
#[must_use]
pub fn deobfuscate(encoded: &str) -> String {
    if encoded.is_empty() {
        return String::new();
    }

    let Ok(xored) = STANDARD.decode(encoded) else {
        return String::new();
    };

    let plain: Vec<u8> = xored
        .into_iter()
        .enumerate()
        .map(|(i, b)| b ^ SALT[i % SALT.len()])
        .collect();

    String::from_utf8(plain).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_arbitrary_key() {
        let key = "AIzaSyD-this-is-not-a-real-key-1234567890";
        let obfuscated = obfuscate(key);
        assert_ne!(obfuscated, key);
        assert_eq!(deobfuscate(&obfuscated), key);
    }

    #[test]
    fn empty_key_round_trips_to_empty() {
        assert_eq!(deobfuscate(&obfuscate("")), "");
    }

    #[test]
    fn garbage_input_deobfuscates_to_empty_rather_than_panicking() {
        assert_eq!(deobfuscate("not valid base64 !!!"), "");
    }
}
