//! Holder display names.
//!
//! Logged-in users hold units under their account name. Anonymous tabs get
//! a generated `AdjectiveNoun123` name so that other viewers can tell holds
//! apart.

use rand::seq::IndexedRandom;
use rand::Rng;

const ADJECTIVES: &[&str] = &[
    "Happy", "Swift", "Brave", "Clever", "Calm", "Bright", "Lucky", "Quiet", "Bold", "Gentle",
    "Sunny", "Witty",
];

const NOUNS: &[&str] = &[
    "Tiger", "Eagle", "Wolf", "Fox", "Bear", "Otter", "Falcon", "Panda", "Lion", "Hawk", "Dolphin",
    "Owl",
];

/// Generate a random `AdjectiveNoun` name with a number in `1..=999`.
pub fn generate_display_name() -> String {
    let mut rng = rand::rng();
    let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("Happy");
    let noun = NOUNS.choose(&mut rng).copied().unwrap_or("Tiger");
    let number: u16 = rng.random_range(1..=999);
    format!("{adjective}{noun}{number}")
}

/// Use the logged-in name when there is one, otherwise generate one.
pub fn resolve_display_name(login_name: Option<&str>) -> String {
    match login_name.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => generate_display_name(),
    }
}
