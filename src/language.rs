use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TerpError;

/// Recognition/translation source language.
///
/// Closed set of locale tags the server accepts. The wire format is the
/// BCP 47 tag (e.g. `hi-IN`), which is also what the config file uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "en-US")]
    EnglishUs,
    #[serde(rename = "hi-IN")]
    Hindi,
    #[serde(rename = "pa-IN")]
    Punjabi,
    #[serde(rename = "fr-FR")]
    French,
    #[serde(rename = "es-ES")]
    Spanish,
    #[serde(rename = "de-DE")]
    German,
}

impl Language {
    pub const ALL: [Self; 6] = [
        Self::EnglishUs,
        Self::Hindi,
        Self::Punjabi,
        Self::French,
        Self::Spanish,
        Self::German,
    ];

    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::EnglishUs => "en-US",
            Self::Hindi => "hi-IN",
            Self::Punjabi => "pa-IN",
            Self::French => "fr-FR",
            Self::Spanish => "es-ES",
            Self::German => "de-DE",
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::EnglishUs => "English",
            Self::Hindi => "Hindi",
            Self::Punjabi => "Punjabi",
            Self::French => "French",
            Self::Spanish => "Spanish",
            Self::German => "German",
        }
    }
}

impl Default for Language {
    fn default() -> Self {
        Self::Hindi
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Language {
    type Err = TerpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|lang| lang.tag().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                TerpError::Config(format!(
                    "unsupported language '{s}'; supported: en-US, hi-IN, pa-IN, fr-FR, es-ES, de-DE"
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_hindi() {
        assert_eq!(Language::default(), Language::Hindi);
    }

    #[test]
    fn tags_round_trip() {
        for lang in Language::ALL {
            let parsed: Language = lang.tag().parse().unwrap_or_else(|e| panic!("{e}"));
            assert_eq!(parsed, lang);
        }
    }

    #[test]
    fn parse_is_case_insensitive() {
        let lang: Language = "PA-in".parse().unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(lang, Language::Punjabi);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert!("it-IT".parse::<Language>().is_err());
    }

    #[test]
    fn serde_uses_tags() {
        let json = serde_json::to_string(&Language::French).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(json, "\"fr-FR\"");
        let back: Language = serde_json::from_str(&json).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(back, Language::French);
    }
}
