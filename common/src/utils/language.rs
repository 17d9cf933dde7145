use serde::{Deserialize, Serialize};
use whatlang::Lang;

/// The closed set of locales the prompt tables cover. Anything else falls
/// back to English.
pub const SUPPORTED_LANGUAGE_CODES: [&str; 5] = ["de", "en", "es", "it", "fr"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    De,
    #[default]
    En,
    Es,
    It,
    Fr,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Language::De => "de",
            Language::En => "en",
            Language::Es => "es",
            Language::It => "it",
            Language::Fr => "fr",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "de" => Some(Language::De),
            "en" => Some(Language::En),
            "es" => Some(Language::Es),
            "it" => Some(Language::It),
            "fr" => Some(Language::Fr),
            _ => None,
        }
    }

    pub fn detect(text: &str) -> Self {
        match whatlang::detect_lang(text) {
            Some(Lang::Deu) => Language::De,
            Some(Lang::Spa) => Language::Es,
            Some(Lang::Ita) => Language::It,
            Some(Lang::Fra) => Language::Fr,
            _ => Language::En,
        }
    }

    /// Stored language column wins when it names a supported locale;
    /// otherwise detect from the input text.
    pub fn resolve(stored: Option<&str>, input_text: &str) -> Self {
        stored
            .and_then(Self::from_code)
            .unwrap_or_else(|| Self::detect(input_text))
    }

    pub fn system_prompt(self) -> &'static str {
        match self {
            Language::De => "Dies ist ein deutscher Systemprompt.",
            Language::En => "This is an English system prompt.",
            Language::Fr => "Ceci est un prompt système français.",
            Language::Es => "Este es un mensaje del sistema en español.",
            Language::It => "Questo è un prompt di sistema italiano.",
        }
    }

    pub fn header_prompt(self) -> &'static str {
        match self {
            Language::De => "ANONYMISIERTER TEXT (Platzhalter = sensible Daten)",
            Language::En => "ANONYMIZED TEXT (placeholders = sensitive data)",
            Language::Fr => "TEXTE ANONYMISÉ (espaces réservés = données sensibles)",
            Language::Es => "TEXTO ANONIMIZADO (marcadores = datos sensibles)",
            Language::It => "TESTO ANONIMIZZATO (segnaposto = dati sensibili)",
        }
    }

    pub fn footer_prompt(self) -> &'static str {
        match self {
            Language::De => "ENDE DES ANONYMISIERTEN TEXTES. Platzhalter sind wie reale Werte zu interpretieren; ein Rückschluss auf Originaldaten ist nicht möglich.",
            Language::En => "END OF ANONYMIZED TEXT. Placeholders should be interpreted as real values; de-anonymization is not possible.",
            Language::Fr => "FIN DU TEXTE ANONYMISÉ. Les espaces réservés doivent être interprétés comme des valeurs réelles; la désanonymisation n'est pas possible.",
            Language::Es => "FIN DEL TEXTO ANONIMIZADO. Los marcadores deben interpretarse como valores reales; no es posible desanonimizar.",
            Language::It => "FINE DEL TESTO ANONIMIZZATO. I segnaposto devono essere interpretati come valori reali; non è possibile risalire o de-anonimizzare.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_code_covers_supported_set() {
        for code in SUPPORTED_LANGUAGE_CODES {
            assert!(Language::from_code(code).is_some(), "missing {code}");
        }
        assert_eq!(Language::from_code("pt"), None);
        assert_eq!(Language::from_code(""), None);
    }

    #[test]
    fn from_code_is_case_insensitive() {
        assert_eq!(Language::from_code("DE"), Some(Language::De));
        assert_eq!(Language::from_code(" en "), Some(Language::En));
    }

    #[test]
    fn resolve_prefers_stored_language() {
        let lang = Language::resolve(Some("it"), "Das ist ein deutscher Satz.");
        assert_eq!(lang, Language::It);
    }

    #[test]
    fn resolve_detects_when_stored_is_invalid() {
        let text = "Dies ist ein längerer deutscher Beispieltext über das Wetter in Berlin.";
        assert_eq!(Language::resolve(Some("xx"), text), Language::De);
        assert_eq!(Language::resolve(None, text), Language::De);
    }

    #[test]
    fn prompts_exist_for_every_language() {
        for lang in [
            Language::De,
            Language::En,
            Language::Es,
            Language::It,
            Language::Fr,
        ] {
            assert!(!lang.system_prompt().is_empty());
            assert!(!lang.header_prompt().is_empty());
            assert!(!lang.footer_prompt().is_empty());
        }
    }
}
