//! Minimal ULID generation: a 26-character Crockford base32 string, lexicographically
//! sortable, encoding a millisecond timestamp followed by 80 bits of randomness.
//!
//! No crate in the dependency stack provides this, so it's implemented directly rather
//! than pulled in as a one-off dependency.

use rand::RngCore;

const ENCODING: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Generates a new ULID string for use as a canonical person ID.
pub fn new() -> String {
    let ms = chrono::Utc::now().timestamp_millis().max(0) as u64;
    let mut rand_bytes = [0u8; 10];
    rand::thread_rng().fill_bytes(&mut rand_bytes);
    encode(ms, &rand_bytes)
}

fn encode(ms: u64, rand_bytes: &[u8; 10]) -> String {
    let mut out = String::with_capacity(26);

    // 48-bit timestamp -> 10 base32 chars
    for i in (0..10).rev() {
        let shift = i * 5;
        let idx = ((ms >> shift) & 0x1F) as usize;
        out.push(ENCODING[idx] as char);
    }

    // 80-bit randomness -> 16 base32 chars, encoded 5 bits at a time over a bit buffer
    let mut acc: u128 = 0;
    for b in rand_bytes {
        acc = (acc << 8) | *b as u128;
    }
    for i in (0..16).rev() {
        let shift = i * 5;
        let idx = ((acc >> shift) & 0x1F) as usize;
        out.push(ENCODING[idx] as char);
    }

    out
}

/// Whether `s` matches the ULID alphabet and length used for canonical person IDs.
pub fn is_ulid(s: &str) -> bool {
    s.len() == 26 && s.bytes().all(|b| ENCODING.contains(&b.to_ascii_uppercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_valid_ulids() {
        let id = new();
        assert_eq!(id.len(), 26);
        assert!(is_ulid(&id));
    }

    #[test]
    fn ulids_are_roughly_time_sortable() {
        let a = new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = new();
        assert!(a < b);
    }

    #[test]
    fn rejects_non_ulid_strings() {
        assert!(!is_ulid("not-a-ulid"));
        assert!(!is_ulid(""));
    }
}
