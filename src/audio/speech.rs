use url::Url;

const TTS_ENDPOINT: &str = "https://translate.google.com/translate_tts";

/// Turns chat text into a streamable synthesized-speech URL.
///
/// The text is passed through as typed; only URL encoding is applied.
#[derive(Debug, Clone)]
pub struct SpeechSynthesizer {
    language: String,
    slow: bool,
}

impl SpeechSynthesizer {
    pub fn new(language: impl Into<String>, slow: bool) -> Self {
        Self {
            language: language.into(),
            slow,
        }
    }

    pub fn source_url(&self, text: &str) -> Result<Url, url::ParseError> {
        let speed = if self.slow { "0.24" } else { "1" };
        let textlen = text.chars().count().to_string();
        Url::parse_with_params(
            TTS_ENDPOINT,
            [
                ("ie", "UTF-8"),
                ("q", text),
                ("tl", self.language.as_str()),
                ("total", "1"),
                ("idx", "0"),
                ("textlen", textlen.as_str()),
                ("client", "tw-ob"),
                ("ttsspeed", speed),
            ],
        )
    }
}
