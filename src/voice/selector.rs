//! Choice between on-device synthesis and the remote speech endpoint

use crate::language::Language;

use super::engine::{SpeechSynthesizer, VoiceInfo};

/// Languages whose on-device voices are good enough to use by default
pub const DEFAULT_LOCAL_LANGUAGES: [Language; 2] = [Language::English, Language::Hindi];

/// Backend picked for a narration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceRoute {
    /// Single utterance on the local synthesis engine
    Local,
    /// Chunked playback of audio fetched from the remote endpoint
    Remote,
}

/// Picks a [`VoiceRoute`] per narration
///
/// The decision is never cached: engines load their voice lists
/// asynchronously, so the registry is consulted on every call.
#[derive(Debug, Clone)]
pub struct VoiceSelector {
    local_languages: Vec<Language>,
}

impl Default for VoiceSelector {
    fn default() -> Self {
        Self::new(DEFAULT_LOCAL_LANGUAGES.to_vec())
    }
}

impl VoiceSelector {
    /// Create a selector with the given local-voice allow-list
    #[must_use]
    pub const fn new(local_languages: Vec<Language>) -> Self {
        Self { local_languages }
    }

    /// Languages allowed to use on-device voices
    #[must_use]
    pub fn local_languages(&self) -> &[Language] {
        &self.local_languages
    }

    /// Decide the route from a snapshot of the voice registry
    #[must_use]
    pub fn select(&self, language: Language, voices: &[VoiceInfo]) -> VoiceRoute {
        let allowed = self.local_languages.contains(&language);
        let available = has_voice_for(voices, language);

        if allowed && available {
            VoiceRoute::Local
        } else {
            VoiceRoute::Remote
        }
    }

    /// Query the engine's registry and decide the route
    pub async fn select_for(
        &self,
        language: Language,
        synthesizer: &dyn SpeechSynthesizer,
    ) -> VoiceRoute {
        if !self.local_languages.contains(&language) {
            return VoiceRoute::Remote;
        }

        let voices = synthesizer.voices().await;
        let route = self.select(language, &voices);
        tracing::debug!(
            language = language.code(),
            voices = voices.len(),
            ?route,
            "voice route selected"
        );
        route
    }
}

/// Whether any registered voice's tag starts with the language code
fn has_voice_for(voices: &[VoiceInfo], language: Language) -> bool {
    voices
        .iter()
        .any(|v| v.lang.to_ascii_lowercase().starts_with(language.code()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Vec<VoiceInfo> {
        vec![
            VoiceInfo::new("en-us", "en-US"),
            VoiceInfo::new("hindi", "hi"),
            VoiceInfo::new("tamil", "ta"),
        ]
    }

    #[test]
    fn allowed_language_with_voice_is_local() {
        let selector = VoiceSelector::default();
        assert_eq!(selector.select(Language::English, &registry()), VoiceRoute::Local);
        assert_eq!(selector.select(Language::Hindi, &registry()), VoiceRoute::Local);
    }

    #[test]
    fn voice_outside_allow_list_is_remote() {
        let selector = VoiceSelector::default();
        assert_eq!(selector.select(Language::Tamil, &registry()), VoiceRoute::Remote);
    }

    #[test]
    fn allowed_language_without_voice_is_remote() {
        let selector = VoiceSelector::default();
        assert_eq!(selector.select(Language::Hindi, &[]), VoiceRoute::Remote);
    }

    #[test]
    fn custom_allow_list() {
        let selector = VoiceSelector::new(vec![Language::Tamil]);
        assert_eq!(selector.select(Language::Tamil, &registry()), VoiceRoute::Local);
        assert_eq!(selector.select(Language::English, &registry()), VoiceRoute::Remote);
    }
}
