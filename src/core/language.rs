use std::fmt;

/// Response language for the assistant, from a fixed lookup.
///
/// Spanish is the session default. For any other selection the outbound
/// prompt is prefixed with an instruction asking the model to answer in
/// that language; whether the model complies is best-effort and never
/// verified on this side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    Spanish,
    English,
    French,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Spanish, Language::English, Language::French];

    /// Two-letter code used on the command line and in the prompt prefix.
    pub fn code(self) -> &'static str {
        match self {
            Language::Spanish => "es",
            Language::English => "en",
            Language::French => "fr",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Language::Spanish => "Español",
            Language::English => "Inglés",
            Language::French => "Francés",
        }
    }

    /// Build the outbound prompt for `text`.
    ///
    /// The default language passes the text through untouched; any other
    /// language wraps it with the instruction prefix.
    pub fn prompt(self, text: &str) -> String {
        if self == Language::default() {
            text.to_string()
        } else {
            format!("Por favor responde en {}. Usuario: {}", self.code(), text)
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl TryFrom<&str> for Language {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Language::ALL
            .into_iter()
            .find(|language| language.code() == value)
            .ok_or_else(|| format!("unknown language code: {value}"))
    }
}
