//! Cosmetic display names for addresses.

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

const ADJECTIVES: [&str; 24] = [
    "Amber", "Brisk", "Clever", "Daring", "Eager", "Fabled", "Gentle", "Hardy", "Idle", "Jolly",
    "Keen", "Lucky", "Mellow", "Nimble", "Quiet", "Rapid", "Steady", "Tidy", "Upbeat", "Vivid",
    "Witty", "Young", "Zesty", "Bold",
];

const NOUNS: [&str; 16] = [
    "Trader", "Broker", "Merchant", "Artisan", "Courier", "Scout", "Tinker", "Scribe", "Smith",
    "Weaver", "Vendor", "Builder", "Agent", "Peddler", "Factor", "Dealer",
];

static INTRODUCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bI(?:'m|’m| am)\s+([A-Z][A-Za-z0-9_-]{1,23})\b").unwrap()
});

/// Derive a two-word label (adjective + noun) from an address.
///
/// Pure and stable across processes: the same address always yields the same
/// label. Collisions between addresses are possible.
pub fn friendly_name(address: &str) -> String {
    let digest = Sha256::digest(address.as_bytes());
    let adjective = usize::from(u16::from_be_bytes([digest[0], digest[1]])) % ADJECTIVES.len();
    let noun = usize::from(u16::from_be_bytes([digest[2], digest[3]])) % NOUNS.len();
    format!("{} {}", ADJECTIVES[adjective], NOUNS[noun])
}

/// Extract a self-introduced name ("I'm Alice") from a chat line.
pub fn introduced_name(text: &str) -> Option<String> {
    INTRODUCTION
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
