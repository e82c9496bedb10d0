//! Public share tokens and links

use rand::Rng;

/// URL-safe alphabet (same symbols as nanoid)
const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

pub const SHARE_ID_LEN: usize = 10;

/// Generate a random share token
pub fn generate_share_id() -> String {
    let mut rng = rand::rng();
    (0..SHARE_ID_LEN)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Build the public link for a share token: `{base}/card/{share_id}`
pub fn share_url(base: &str, share_id: &str) -> String {
    format!("{}/card/{}", base.trim_end_matches('/'), share_id)
}
