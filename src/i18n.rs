//! Display-language registry. The string tables themselves live in the UI
//! layer; the data store only needs the language code, its English name
//! for capability prompts, and the text direction.

pub const DEFAULT_LANGUAGE: &str = "ko";

pub const SUPPORTED_LANGUAGES: &[&str] = &["ko", "en", "zh", "ja", "es", "fr", "de", "it", "ar"];

/// English name of a language code, as fed to the capability prompts.
/// Unknown codes fall back to English.
pub fn language_name(code: &str) -> &'static str {
    match code {
        "ko" => "Korean",
        "en" => "English",
        "zh" => "Chinese (Simplified)",
        "ja" => "Japanese",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "it" => "Italian",
        "ar" => "Arabic",
        _ => "English",
    }
}

pub fn is_rtl(code: &str) -> bool {
    code == "ar"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_resolve() {
        assert_eq!(language_name("ko"), "Korean");
        assert_eq!(language_name("ar"), "Arabic");
    }

    #[test]
    fn unknown_code_falls_back_to_english() {
        assert_eq!(language_name("xx"), "English");
    }

    #[test]
    fn only_arabic_is_rtl() {
        assert!(is_rtl("ar"));
        assert!(!is_rtl("ko"));
    }
}
