use std::fmt;

/// The fixed set of chat models the client can talk to.
///
/// The Groq endpoint serves more models than these, but the client only
/// offers the ones it has been exercised against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelId {
    #[default]
    Llama3_8b,
    Llama3_70b,
    Mixtral8x7b,
}

impl ModelId {
    pub const ALL: [ModelId; 3] = [ModelId::Llama3_8b, ModelId::Llama3_70b, ModelId::Mixtral8x7b];

    /// Identifier sent in the `model` field of a completion request.
    pub fn as_str(self) -> &'static str {
        match self {
            ModelId::Llama3_8b => "llama3-8b-8192",
            ModelId::Llama3_70b => "llama3-70b-8192",
            ModelId::Mixtral8x7b => "mixtral-8x7b-32768",
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ModelId {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        ModelId::ALL
            .into_iter()
            .find(|model| model.as_str() == value)
            .ok_or_else(|| format!("unknown model: {value}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_listed_model() {
        for model in ModelId::ALL {
            assert_eq!(ModelId::try_from(model.as_str()), Ok(model));
        }
    }

    #[test]
    fn rejects_unlisted_models() {
        assert!(ModelId::try_from("gpt-4o").is_err());
    }

    #[test]
    fn default_is_the_small_llama() {
        assert_eq!(ModelId::default().as_str(), "llama3-8b-8192");
    }
}
