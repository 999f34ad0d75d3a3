//! Audio and subtitle languages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A language (or regional variant) for audio and subtitle tracks.
///
/// Regional variants exist where they change what a viewer gets:
/// English accents and the Latin-American Spanish / Brazilian Portuguese
/// dubs. Anything not listed cannot be represented and such tracks are
/// dropped during classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "en")]
    En,
    #[serde(rename = "en-US")]
    EnUs,
    #[serde(rename = "en-GB")]
    EnGb,
    #[serde(rename = "ru")]
    Ru,
    #[serde(rename = "uk")]
    Uk,
    #[serde(rename = "es")]
    Es,
    #[serde(rename = "es-419")]
    Es419,
    #[serde(rename = "fr")]
    Fr,
    #[serde(rename = "de")]
    De,
    #[serde(rename = "it")]
    It,
    #[serde(rename = "pt")]
    Pt,
    #[serde(rename = "pt-BR")]
    PtBr,
    #[serde(rename = "pl")]
    Pl,
    #[serde(rename = "tr")]
    Tr,
    #[serde(rename = "ja")]
    Ja,
    #[serde(rename = "ko")]
    Ko,
    #[serde(rename = "zh")]
    Zh,
}

/// (variant, key, ISO 639-2 codes, English names)
type LanguageEntry = (
    Language,
    &'static str,
    &'static [&'static str],
    &'static [&'static str],
);

const LANGUAGES: [LanguageEntry; 17] = [
    (Language::En, "en", &["eng"], &["english"]),
    (Language::EnUs, "en-US", &[], &["american"]),
    (Language::EnGb, "en-GB", &[], &["british"]),
    (Language::Ru, "ru", &["rus"], &["russian"]),
    (Language::Uk, "uk", &["ukr"], &["ukrainian"]),
    (Language::Es, "es", &["spa"], &["spanish", "castilian"]),
    (Language::Es419, "es-419", &[], &["latin american spanish", "latino"]),
    (Language::Fr, "fr", &["fre", "fra"], &["french"]),
    (Language::De, "de", &["ger", "deu"], &["german"]),
    (Language::It, "it", &["ita"], &["italian"]),
    (Language::Pt, "pt", &["por"], &["portuguese"]),
    (Language::PtBr, "pt-BR", &[], &["brazilian", "portuguese (brazil)"]),
    (Language::Pl, "pl", &["pol"], &["polish"]),
    (Language::Tr, "tr", &["tur"], &["turkish"]),
    (Language::Ja, "ja", &["jpn"], &["japanese"]),
    (Language::Ko, "ko", &["kor"], &["korean"]),
    (Language::Zh, "zh", &["chi", "zho"], &["chinese", "mandarin"]),
];

impl Language {
    fn entry(self) -> &'static LanguageEntry {
        &LANGUAGES[self as usize]
    }

    /// BCP-47 style key (`en`, `en-US`, `es-419`).
    pub fn key(self) -> &'static str {
        self.entry().1
    }

    /// Look up a language by ISO 639-1/639-2 code or BCP-47 key.
    ///
    /// `und`, empty strings and unknown codes resolve to `None`.
    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim().replace('_', "-");
        if code.is_empty() {
            return None;
        }
        LANGUAGES
            .iter()
            .find(|(_, key, iso2, _)| {
                key.eq_ignore_ascii_case(&code) || iso2.iter().any(|c| c.eq_ignore_ascii_case(&code))
            })
            .map(|(lang, _, _, _)| *lang)
    }

    /// Look up a language by English display name, as reported by indexers.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.trim().to_lowercase();
        LANGUAGES
            .iter()
            .find(|(_, _, _, names)| names.iter().any(|n| *n == lower))
            .map(|(lang, _, _, _)| *lang)
    }

    /// Base language with the regional variant stripped.
    pub fn base(self) -> Language {
        match self {
            Language::EnUs | Language::EnGb => Language::En,
            Language::Es419 => Language::Es,
            Language::PtBr => Language::Pt,
            other => other,
        }
    }

    pub fn is_english(self) -> bool {
        self.base() == Language::En
    }

    /// Narrow a generic English track to the title's original English
    /// variant. Other languages are returned unchanged.
    pub fn specialize_for(self, original: Option<Language>) -> Language {
        match original {
            Some(orig) if self == Language::En && orig.is_english() => orig,
            _ => self,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
