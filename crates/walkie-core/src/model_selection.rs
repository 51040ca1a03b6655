//! Provider/model selection.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Backend-supported model providers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Provider {
    Openai,
    Google,
    Grok,
    Deepseek,
    Anthropic,
    #[default]
    None,
}

impl Provider {
    /// Models offered for this provider.
    pub fn models(&self) -> &'static [&'static str] {
        match self {
            Provider::Openai => &["gpt-4", "gpt-4o", "gpt-4o-mini", "o1"],
            Provider::Google => &[
                "gemini-2.0-flash",
                "gemini-1.5-flash",
                "gemini-2.0-pro-exp-02-05",
            ],
            Provider::Grok => &["grok-2-latest"],
            Provider::Deepseek => &["deepseek-chat"],
            Provider::Anthropic => &[
                "claude-3-5-sonnet-20240620",
                "claude-3-7-sonnet-20250219",
                "claude-3-5-haiku-20240307",
                "claude-3-opus-20240229",
            ],
            Provider::None => &[],
        }
    }

    pub fn offers(&self, model: &str) -> bool {
        self.models().contains(&model)
    }
}

/// The provider+model pair a turn is sent with. Persisted as a user
/// preference.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModelSelection {
    #[serde(default)]
    pub provider: Provider,
    #[serde(default)]
    pub model: String,
}

impl ModelSelection {
    pub fn new(provider: Provider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Whether a turn can be sent with this selection.
    pub fn is_selected(&self) -> bool {
        self.provider != Provider::None && !self.model.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_provider_names_match_wire() {
        assert_eq!(Provider::Openai.to_string(), "openai");
        assert_eq!(Provider::from_str("anthropic").unwrap(), Provider::Anthropic);
        assert_eq!(serde_json::to_string(&Provider::Deepseek).unwrap(), "\"deepseek\"");
    }

    #[test]
    fn test_every_real_provider_offers_models() {
        for provider in Provider::iter().filter(|p| *p != Provider::None) {
            assert!(!provider.models().is_empty(), "{provider} has no models");
        }
        assert!(Provider::Grok.offers("grok-2-latest"));
        assert!(!Provider::Grok.offers("gpt-4"));
    }

    #[test]
    fn test_default_selection_is_unusable() {
        assert!(!ModelSelection::default().is_selected());
        assert!(!ModelSelection::new(Provider::Openai, "").is_selected());
        assert!(ModelSelection::new(Provider::Openai, "gpt-4o").is_selected());
    }
}
