//! Model Catalog
//!
//! Bot-level model identifiers and their mapping to backend model variants.
//!
//! - **Managed** models (`Gpt35`, `Gpt4o`): dialog context and token balance
//!   live in the token accounting service.
//! - **Legacy** models: dialog history is kept locally by the completion gateway.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelId {
    #[default]
    Gpt35,
    Gpt4o,
    /// Not on the keyboard and not reachable by callback. Only sessions
    /// already stored with `gpt-4` (restored from SQLite) still use it.
    Gpt4Legacy,
}

impl ModelId {
    /// Models offered on the selection keyboard, in display order
    pub const SELECTABLE: [ModelId; 2] = [ModelId::Gpt35, ModelId::Gpt4o];

    /// Models listed on the balance screen
    pub const ACCOUNTED: [ModelId; 2] = [ModelId::Gpt35, ModelId::Gpt4o];

    /// Callback payload and storage key
    pub fn payload(&self) -> &'static str {
        match self {
            Self::Gpt35 => "gpt-3.5-turbo",
            Self::Gpt4o => "gpt-4o",
            Self::Gpt4Legacy => "gpt-4",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Gpt35 => "GPT-3.5",
            Self::Gpt4o => "GPT-4o",
            Self::Gpt4Legacy => "GPT-4",
        }
    }

    /// Model name the completion backend expects
    pub fn variant(&self) -> &'static str {
        match self {
            Self::Gpt35 => "gpt-3.5-turbo-0125",
            Self::Gpt4o => "gpt-4o",
            Self::Gpt4Legacy => "gpt-4-turbo",
        }
    }

    pub fn is_managed(&self) -> bool {
        matches!(self, Self::Gpt35 | Self::Gpt4o)
    }

    pub fn from_payload(payload: &str) -> Option<Self> {
        [Self::Gpt35, Self::Gpt4o, Self::Gpt4Legacy]
            .into_iter()
            .find(|m| m.payload() == payload)
    }

    /// Only models that appear on the keyboard can be chosen by callback
    pub fn selectable_from_payload(payload: &str) -> Option<Self> {
        Self::SELECTABLE.into_iter().find(|m| m.payload() == payload)
    }
}
