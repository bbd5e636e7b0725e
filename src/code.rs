use rand::Rng;

/// Length of every generated short code.
pub const CODE_LEN: usize = 6;

/// 62 symbols, so six characters give ~5.7×10^10 distinct codes.
pub const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Codes that fixed routes would shadow; never handed out.
pub const RESERVED: &[&str] = &["health"];

/// Generate a random alphanumeric string of the given length.
pub fn random_code(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}
