//! Random fixtures for tests and local seeding

use rand::Rng;
use rand::seq::SliceRandom;

use crate::ledger::SUPPORTED_CURRENCIES;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// Uniform integer in `[min, max]`
pub fn random_int(min: i64, max: i64) -> i64 {
    rand::thread_rng().gen_range(min..=max)
}

/// Lowercase ASCII string of length `n`
pub fn random_string(n: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..n)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

pub fn random_owner() -> String {
    random_string(6)
}

/// Amount in minor units, `0..=10000`
pub fn random_money() -> i64 {
    random_int(0, 10_000)
}

pub fn random_currency() -> String {
    SUPPORTED_CURRENCIES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("USD")
        .to_string()
}
