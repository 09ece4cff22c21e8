//! Opaque identifiers: a short type prefix followed by random base-36
//! characters. They are not secrets and must never gate access on their own.

use rand::Rng;

const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Number of random characters after the prefix.
pub const RANDOM_LEN: usize = 10;

pub const SCRIPT_PREFIX: &str = "scr_";
pub const USER_PREFIX: &str = "usr_";

pub fn generate(prefix: &str) -> String {
    let mut rng = rand::rng();
    let mut id = String::with_capacity(prefix.len() + RANDOM_LEN);
    id.push_str(prefix);
    for _ in 0..RANDOM_LEN {
        id.push(ALPHABET[rng.random_range(0..ALPHABET.len())] as char);
    }
    id
}

pub fn script_id() -> String {
    generate(SCRIPT_PREFIX)
}

pub fn user_id() -> String {
    generate(USER_PREFIX)
}
