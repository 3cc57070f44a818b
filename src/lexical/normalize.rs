//! Text normalization and language detection

use crate::config::LanguageSetting;
use crate::types::Language;

/// Hangul compatibility jamo consonants (ㄱ-ㅎ)
const JAMO_CONSONANTS: std::ops::RangeInclusive<char> = '\u{3131}'..='\u{314E}';
/// Hangul compatibility jamo vowels (ㅏ-ㅣ)
const JAMO_VOWELS: std::ops::RangeInclusive<char> = '\u{314F}'..='\u{3163}';
/// Precomposed Hangul syllables (가-힣)
const HANGUL_SYLLABLES: std::ops::RangeInclusive<char> = '\u{AC00}'..='\u{D7A3}';

fn is_hangul(c: char) -> bool {
    JAMO_CONSONANTS.contains(&c) || JAMO_VOWELS.contains(&c) || HANGUL_SYLLABLES.contains(&c)
}

/// Characters kept by [`normalize`]
fn is_kept(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || c == '_'
        || c.is_whitespace()
        || is_hangul(c)
        || matches!(c, '.' | ',' | '!' | '?')
}

/// Trim, collapse whitespace runs to a single space, then drop every character
/// outside ASCII word characters, whitespace, Hangul and `.,!?`.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .filter(|c| is_kept(*c))
        .collect()
}

/// Pick the scoring language: an explicit setting wins, otherwise any Hangul
/// selects Korean and everything else is English.
pub fn detect_language(text: &str, setting: LanguageSetting) -> Language {
    match setting {
        LanguageSetting::Ko => Language::Korean,
        LanguageSetting::En => Language::English,
        LanguageSetting::Auto if text.chars().any(is_hangul) => Language::Korean,
        LanguageSetting::Auto => Language::English,
    }
}
