//! Languages supported by the multilingual model.
//!
//! Every language except English ships a built-in reference clip that is
//! used when a multilingual request does not name a voice.

/// A supported language and its optional built-in reference sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Language {
    /// ISO 639-1 code (e.g. `"fr"`).
    pub code: &'static str,
    /// English display name (e.g. `"French"`).
    pub name: &'static str,
    /// URL of the built-in reference clip.
    pub sample_url: Option<&'static str>,
    /// Demo sentence in the language.
    pub sample_text: &'static str,
}

impl Language {
    pub fn has_default_voice(&self) -> bool {
        self.sample_url.is_some()
    }

    /// Label of the built-in voice as shown in voice pickers, e.g. `"Default (French)"`.
    pub fn default_voice_label(&self) -> String {
        format!("Default ({})", self.name)
    }
}

/// Code of the language that voices without a language suffix belong to.
pub const ENGLISH: &str = "en";

macro_rules! lang {
    ($code:literal, $name:literal, None, $text:literal) => {
        Language {
            code: $code,
            name: $name,
            sample_url: None,
            sample_text: $text,
        }
    };
    ($code:literal, $name:literal, $file:literal, $text:literal) => {
        Language {
            code: $code,
            name: $name,
            sample_url: Some(concat!(
                "https://storage.googleapis.com/chatterbox-demo-samples/mtl_prompts/",
                $file
            )),
            sample_text: $text,
        }
    };
}

static LANGUAGES: &[Language] = &[
    lang!("ar", "Arabic", "ar_f/ar_prompts2.flac", "مرحبًا! أنا هنا لفتح أسرار الذكاء الاصطناعي!"),
    lang!("da", "Danish", "da_m1.flac", "Hej! Jeg låser op for AI's hemmeligheder!"),
    lang!("de", "German", "de_f1.flac", "Hallo! Ich entschlüssele die Geheimnisse der KI!"),
    lang!("el", "Greek", "el_m.flac", "Γεια σας! Ξεκλειδώνω τα μυστικά της τεχνητής νοημοσύνης!"),
    lang!("en", "English", None, "Hey there! I'm unlocking the secrets of AI!"),
    lang!("es", "Spanish", "es_f1.flac", "¡Hola! Estoy desbloqueando los secretos de la IA!"),
    lang!("fi", "Finnish", "fi_m.flac", "Hei! Avaan tekoälyn salaisuudet!"),
    lang!("fr", "French", "fr_f1.flac", "Salut! Je déverrouille les secrets de l'IA!"),
    lang!("he", "Hebrew", "he_m1.flac", "שלום! אני פותח את סודות הבינה המלאכותית!"),
    lang!("hi", "Hindi", "hi_f1.flac", "नमस्ते! मैं एआई के रहस्यों को खोल रहा हूँ!"),
    lang!("it", "Italian", "it_m1.flac", "Ciao! Sto sbloccando i segreti dell'IA!"),
    lang!("ja", "Japanese", "ja/ja_prompts1.flac", "こんにちは！AIの秘密を解き明かしています！"),
    lang!("ko", "Korean", "ko_f.flac", "안녕하세요! AI의 비밀을 풀고 있습니다!"),
    lang!("ms", "Malay", "ms_f.flac", "Hai! Saya membuka rahsia AI!"),
    lang!("nl", "Dutch", "nl_m.flac", "Hallo! Ik ontgrendel de geheimen van AI!"),
    lang!("no", "Norwegian", "no_f1.flac", "Hei! Jeg låser opp hemmelighetene til AI!"),
    lang!("pl", "Polish", "pl_m.flac", "Cześć! Odkrywam tajemnice sztucznej inteligencji!"),
    lang!("pt", "Portuguese", "pt_m1.flac", "Olá! Estou a desbloquear os segredos da IA!"),
    lang!("ru", "Russian", "ru_m.flac", "Привет! Я раскрываю секреты искусственного интеллекта!"),
    lang!("sv", "Swedish", "sv_f.flac", "Hej! Jag låser upp AI:s hemligheter!"),
    lang!("sw", "Swahili", "sw_m.flac", "Habari! Ninafungua siri za AI!"),
    lang!("tr", "Turkish", "tr_m.flac", "Merhaba! Yapay zekanın sırlarını açığa çıkarıyorum!"),
    lang!("zh", "Chinese", "zh_f2.flac", "大家好！我正在解锁人工智能的秘密！"),
];

/// All supported languages, sorted by code.
pub fn all() -> &'static [Language] {
    LANGUAGES
}

pub fn lookup(code: &str) -> Option<&'static Language> {
    LANGUAGES.iter().find(|lang| lang.code == code)
}

pub fn is_supported(code: &str) -> bool {
    lookup(code).is_some()
}

/// Display name for `code`, or the code itself when unknown.
pub fn display_name(code: &str) -> &str {
    lookup(code).map(|lang| lang.name).unwrap_or(code)
}

/// Language whose built-in voice carries the given label (`"Default (French)"`).
pub fn from_default_voice_label(label: &str) -> Option<&'static Language> {
    let name = label.strip_prefix("Default (")?.strip_suffix(')')?;
    LANGUAGES
        .iter()
        .find(|lang| lang.name == name && lang.has_default_voice())
}

#[cfg(test)]
mod tests {
    use super::{all, display_name, from_default_voice_label, is_supported, lookup, ENGLISH};

    #[test]
    fn table_has_twenty_three_sorted_languages() {
        let codes: Vec<&str> = all().iter().map(|l| l.code).collect();
        assert_eq!(codes.len(), 23);
        let mut sorted = codes.clone();
        sorted.sort_unstable();
        assert_eq!(codes, sorted);
    }

    #[test]
    fn only_english_lacks_a_default_voice() {
        let without: Vec<&str> = all()
            .iter()
            .filter(|l| !l.has_default_voice())
            .map(|l| l.code)
            .collect();
        assert_eq!(without, vec![ENGLISH]);
    }

    #[test]
    fn lookups() {
        assert!(is_supported("fr"));
        assert!(!is_supported("xx"));
        assert_eq!(display_name("ja"), "Japanese");
        assert_eq!(display_name("xx"), "xx");
        assert_eq!(
            lookup("ja").and_then(|l| l.sample_url),
            Some("https://storage.googleapis.com/chatterbox-demo-samples/mtl_prompts/ja/ja_prompts1.flac")
        );
    }

    #[test]
    fn default_voice_labels_round_trip() {
        let french = lookup("fr").unwrap();
        assert_eq!(french.default_voice_label(), "Default (French)");
        assert_eq!(from_default_voice_label("Default (French)"), Some(french));
        assert_eq!(from_default_voice_label("Default (English)"), None);
        assert_eq!(from_default_voice_label("French"), None);
    }
}
