//! License code generation and parsing.
//!
//! Codes are `XXXX-XXXX-XXXX-XXXX`: four groups of four characters drawn from
//! a 32-symbol alphabet without the easily confused `I`, `O`, `0` and `1`.
//! That is 80 bits of entropy per code. The format is part of the public
//! contract: issued codes are printed on receipts and typed by hand, so it
//! cannot change without breaking existing licenses.

use rand::Rng;

use crate::error::{AppError, Result, msg};

pub const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const GROUPS: usize = 4;
pub const GROUP_LEN: usize = 4;
/// Total length including the hyphens between groups.
pub const CODE_LEN: usize = GROUPS * GROUP_LEN + (GROUPS - 1);

/// Generate a fresh license code.
///
/// Uniqueness is not guaranteed here; the issuing transaction checks the
/// store and asks for another code on a collision.
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();

    let mut group = || -> String {
        (0..GROUP_LEN)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect()
    };

    let groups: Vec<String> = (0..GROUPS).map(|_| group()).collect();
    groups.join("-")
}

/// Cheap structural check, done before touching the database.
pub fn is_valid_code(code: &str) -> bool {
    if code.len() != CODE_LEN {
        return false;
    }

    code.split('-').count() == GROUPS
        && code.split('-').all(|group| {
            group.len() == GROUP_LEN && group.bytes().all(|b| ALPHABET.contains(&b))
        })
}

/// Normalize a user-supplied code (surrounding whitespace, lowercase) and
/// validate its format.
pub fn normalize_code(input: &str) -> Result<String> {
    let code = input.trim().to_ascii_uppercase();
    if !is_valid_code(&code) {
        return Err(AppError::Validation(msg::INVALID_CODE_FORMAT.into()));
    }
    Ok(code)
}
