//! Random token generation.

use rand::Rng;

/// Alphanumeric alphabet used for session tokens.
pub const BASE62: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Default token length.
pub const TOKEN_LENGTH: usize = 16;

/// Generate `size` characters drawn uniformly from `charset`.
///
/// Not cryptographically secure; tokens only need to be unlikely to collide
/// with real output. Returns an empty string for an empty charset.
pub fn generate_random(size: usize, charset: &str) -> String {
    let chars: Vec<char> = charset.chars().collect();
    if chars.is_empty() {
        return String::new();
    }

    let mut rng = rand::thread_rng();
    (0..size)
        .map(|_| chars[rng.gen_range(0..chars.len())])
        .collect()
}

/// Generate a fresh base62 token of the default length.
pub fn generate_token() -> String {
    generate_random(TOKEN_LENGTH, BASE62)
}
