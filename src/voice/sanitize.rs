//! Text cleanup before narration
//!
//! LLM replies arrive as markdown. Speech engines read punctuation aloud,
//! so markup symbols are removed and whitespace is flattened to single spaces.

/// Characters removed before text is spoken
pub const MARKUP_CHARS: &[char] = &['*', '#', '=', '~', '_', '`', '[', ']', '(', ')', '<', '>'];

/// Strip markdown punctuation and normalize whitespace
///
/// Newlines become spaces, runs of whitespace collapse to one space and the
/// result is trimmed. An empty result means there is nothing to narrate.
#[must_use]
pub fn sanitize(text: &str) -> String {
    let stripped: String = text.chars().filter(|c| !MARKUP_CHARS.contains(c)).collect();

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown_and_collapses_whitespace() {
        assert_eq!(
            sanitize("**Bold** text\n\nwith   spaces"),
            "Bold text with spaces"
        );
    }

    #[test]
    fn removes_every_markup_char() {
        let cleaned = sanitize("# Title\n`code` [link](url) <b>~x~</b> a=b _i_");
        assert!(!cleaned.chars().any(|c| MARKUP_CHARS.contains(&c)));
        assert!(!cleaned.contains("  "));
        assert_eq!(cleaned, "Title code linkurl b x/b ab i");
    }

    #[test]
    fn symbols_only_yields_empty() {
        assert_eq!(sanitize("** ## \n\n ~~ "), "");
        assert_eq!(sanitize(""), "");
    }

    #[test]
    fn keeps_indic_scripts_intact() {
        assert_eq!(sanitize("**नमस्ते**\tदुनिया"), "नमस्ते दुनिया");
    }
}
