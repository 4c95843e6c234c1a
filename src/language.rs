//! Language codes accepted by the translators.

use crate::error::{Result, TranslateError};
use std::fmt;
use std::str::FromStr;

/// Known language codes (ISO 639-1) with their English names.
pub const LANGUAGES: [(&str, &str); 50] = [
    ("af", "Afrikaans"),
    ("ar", "Arabic"),
    ("az", "Azerbaijani"),
    ("be", "Belarusian"),
    ("bg", "Bulgarian"),
    ("bn", "Bengali"),
    ("ca", "Catalan"),
    ("cs", "Czech"),
    ("cy", "Welsh"),
    ("da", "Danish"),
    ("de", "German"),
    ("el", "Greek"),
    ("en", "English"),
    ("eo", "Esperanto"),
    ("es", "Spanish"),
    ("et", "Estonian"),
    ("fa", "Persian"),
    ("fi", "Finnish"),
    ("fr", "French"),
    ("ga", "Irish"),
    ("he", "Hebrew"),
    ("hi", "Hindi"),
    ("hr", "Croatian"),
    ("hu", "Hungarian"),
    ("hy", "Armenian"),
    ("id", "Indonesian"),
    ("is", "Icelandic"),
    ("it", "Italian"),
    ("ja", "Japanese"),
    ("ka", "Georgian"),
    ("kk", "Kazakh"),
    ("ko", "Korean"),
    ("lt", "Lithuanian"),
    ("lv", "Latvian"),
    ("ms", "Malay"),
    ("nb", "Norwegian"),
    ("nl", "Dutch"),
    ("pl", "Polish"),
    ("pt", "Portuguese"),
    ("ro", "Romanian"),
    ("ru", "Russian"),
    ("sk", "Slovak"),
    ("sl", "Slovenian"),
    ("sr", "Serbian"),
    ("sv", "Swedish"),
    ("th", "Thai"),
    ("tr", "Turkish"),
    ("uk", "Ukrainian"),
    ("vi", "Vietnamese"),
    ("zh", "Chinese"),
];

/// A validated target-capable language code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Language(&'static str);

impl Language {
    /// Look up a code in the language table (case-insensitive).
    pub fn new(code: &str) -> Result<Self> {
        let lowercase = code.trim().to_lowercase();
        LANGUAGES
            .iter()
            .find(|(c, _)| *c == lowercase)
            .map(|(c, _)| Language(c))
            .ok_or_else(|| TranslateError::UnknownLanguage(code.to_string()))
    }

    pub fn code(&self) -> &'static str {
        self.0
    }

    pub fn name(&self) -> &'static str {
        LANGUAGES
            .iter()
            .find(|(c, _)| *c == self.0)
            .map(|(_, n)| *n)
            .unwrap_or("Unknown")
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Language {
    type Err = TranslateError;

    fn from_str(s: &str) -> Result<Self> {
        Language::new(s)
    }
}

/// Source side of a translation: a concrete language or backend detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceLanguage {
    Auto,
    Code(Language),
}

impl SourceLanguage {
    pub fn code(&self) -> &'static str {
        match self {
            SourceLanguage::Auto => "auto",
            SourceLanguage::Code(lang) => lang.code(),
        }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, SourceLanguage::Auto)
    }
}

impl From<Language> for SourceLanguage {
    fn from(lang: Language) -> Self {
        SourceLanguage::Code(lang)
    }
}

impl fmt::Display for SourceLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for SourceLanguage {
    type Err = TranslateError;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("auto") {
            Ok(SourceLanguage::Auto)
        } else {
            Language::new(s).map(SourceLanguage::Code)
        }
    }
}
