//! Supported interface languages and their locale tags

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// A language the assistant can speak, listen and generate content in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "hi")]
    Hindi,
    #[serde(rename = "te")]
    Telugu,
    #[serde(rename = "ta")]
    Tamil,
    #[serde(rename = "mr")]
    Marathi,
}

impl Language {
    /// Every supported language, in display order
    pub const ALL: [Self; 5] = [
        Self::English,
        Self::Hindi,
        Self::Telugu,
        Self::Tamil,
        Self::Marathi,
    ];

    /// Two-letter language code (`en`, `hi`, ...)
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Hindi => "hi",
            Self::Telugu => "te",
            Self::Tamil => "ta",
            Self::Marathi => "mr",
        }
    }

    /// English display name, used inside LLM prompts
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Hindi => "Hindi",
            Self::Telugu => "Telugu",
            Self::Tamil => "Tamil",
            Self::Marathi => "Marathi",
        }
    }

    /// Locale tag handed to speech synthesis
    #[must_use]
    pub const fn synthesis_locale(self) -> &'static str {
        match self {
            Self::English => "en-IN",
            Self::Hindi => "hi-IN",
            Self::Telugu => "te-IN",
            Self::Tamil => "ta-IN",
            Self::Marathi => "mr-IN",
        }
    }

    /// Locale tag handed to speech recognition
    #[must_use]
    pub const fn recognition_locale(self) -> &'static str {
        match self {
            Self::English => "en-US",
            Self::Hindi => "hi-IN",
            Self::Telugu => "te-IN",
            Self::Tamil => "ta-IN",
            Self::Marathi => "mr-IN",
        }
    }

    /// Parse a code, falling back to English for anything unknown
    #[must_use]
    pub fn from_code_lossy(code: &str) -> Self {
        code.parse().unwrap_or_else(|_| {
            tracing::warn!(code, "unsupported language code, falling back to English");
            Self::English
        })
    }
}

impl FromStr for Language {
    type Err = Error;

    /// Accepts bare codes and full locale tags (`hi`, `hi-IN`, `TA_in`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let primary = s
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        Self::ALL
            .into_iter()
            .find(|lang| lang.code() == primary)
            .ok_or_else(|| Error::InvalidInput(format!("unsupported language: {s}")))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
