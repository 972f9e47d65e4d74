//! Filename normalization.
//!
//! Turns an arbitrary filename stem into something safe to write anywhere:
//! Cyrillic letters are transliterated to Latin, and every run of characters
//! outside `[A-Za-z0-9_]` collapses into a single underscore.
//!
//! # Examples
//!
//! ```
//! use dirsort::normalize::normalize;
//!
//! assert_eq!(normalize("Привіт світ"), "Privjet_svjet");
//! assert_eq!(normalize("holiday (2).final"), "holiday_2_final");
//! ```

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Lowercase Cyrillic alphabet paired with its Latin rendering.
///
/// The pairing is positional and kept exactly as the sorter has always
/// shipped it, so names produced by earlier runs stay stable.
const CYRILLIC_TO_LATIN: [(char, &str); 37] = [
    ('а', "a"),
    ('б', "b"),
    ('в', "v"),
    ('г', "g"),
    ('д', "d"),
    ('е', "e"),
    ('ё', "e"),
    ('ж', "j"),
    ('з', "z"),
    ('и', "i"),
    ('й', "j"),
    ('к', "k"),
    ('л', "l"),
    ('м', "m"),
    ('н', "n"),
    ('о', "o"),
    ('п', "p"),
    ('р', "r"),
    ('с', "s"),
    ('т', "t"),
    ('у', "u"),
    ('ф', "f"),
    ('х', "h"),
    ('ц', "ts"),
    ('ч', "ch"),
    ('ш', "sh"),
    ('щ', "sch"),
    ('ъ', ""),
    ('ы', "y"),
    ('ь', ""),
    ('э', "e"),
    ('ю', "yu"),
    ('я', "u"),
    ('є', "ja"),
    ('і', "je"),
    ('ї', "ji"),
    ('ґ', "g"),
];

/// Both letter cases of the table above.
static TRANSLITERATION: LazyLock<HashMap<char, String>> = LazyLock::new(|| {
    let mut table = HashMap::with_capacity(CYRILLIC_TO_LATIN.len() * 2);
    for (cyrillic, latin) in CYRILLIC_TO_LATIN {
        table.insert(cyrillic, latin.to_string());
        for upper in cyrillic.to_uppercase() {
            table.insert(upper, latin.to_uppercase());
        }
    }
    table
});

static NON_WORD_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]+").expect("sanitize pattern is valid"));

/// Replaces every character found in the transliteration table, leaving the
/// rest untouched.
pub fn transliterate(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match TRANSLITERATION.get(&c) {
            Some(latin) => out.push_str(latin),
            None => out.push(c),
        }
    }
    out
}

/// Maps a raw filename stem to a filesystem-safe ASCII stem.
///
/// The result only contains ASCII letters, digits and underscores, and
/// `normalize(&normalize(s)) == normalize(s)` holds for every input.
pub fn normalize(stem: &str) -> String {
    let latin = transliterate(stem);
    NON_WORD_RUN.replace_all(&latin, "_").into_owned()
}
