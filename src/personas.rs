//! Personas
//!
//! Fixed set of system messages a user can pick from. The rendered text is
//! sent to the completion gateway as the system prompt.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PersonaId {
    #[default]
    Default,
    Coder,
    Translator,
    Editor,
    Teacher,
}

impl PersonaId {
    pub const ALL: [PersonaId; 5] = [
        PersonaId::Default,
        PersonaId::Coder,
        PersonaId::Translator,
        PersonaId::Editor,
        PersonaId::Teacher,
    ];

    /// Callback payload and storage key
    pub fn payload(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Coder => "coder",
            Self::Translator => "translator",
            Self::Editor => "editor",
            Self::Teacher => "teacher",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Default => "🤖 Standard",
            Self::Coder => "👨‍💻 Programmer",
            Self::Translator => "🌍 Translator",
            Self::Editor => "📝 Editor",
            Self::Teacher => "🎓 Teacher",
        }
    }

    /// System message sent with every completion
    pub fn system_message(&self) -> &'static str {
        match self {
            Self::Default => {
                "You are a helpful assistant. Answer concisely and accurately, \
                 and use Markdown for code."
            }
            Self::Coder => {
                "You are an experienced software engineer. Give working code first, \
                 then a short explanation. Prefer idiomatic solutions and point out pitfalls."
            }
            Self::Translator => {
                "You are a professional translator. Translate the user's text, keeping \
                 tone and formatting. If the text is in English, translate it to Russian; \
                 otherwise translate it to English. Output only the translation."
            }
            Self::Editor => {
                "You are a careful editor. Fix grammar, spelling and style of the user's \
                 text without changing its meaning, then list the main changes."
            }
            Self::Teacher => {
                "You are a patient teacher. Explain step by step with simple examples \
                 and check understanding with a short question at the end."
            }
        }
    }

    pub fn from_payload(payload: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.payload() == payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payloads_are_unique() {
        let mut payloads: Vec<&str> = PersonaId::ALL.iter().map(|p| p.payload()).collect();
        payloads.sort();
        payloads.dedup();
        assert_eq!(payloads.len(), PersonaId::ALL.len());
    }

    #[test]
    fn test_from_payload() {
        assert_eq!(PersonaId::from_payload("coder"), Some(PersonaId::Coder));
        assert_eq!(PersonaId::from_payload("pirate"), None);
    }

    #[test]
    fn test_persona_payloads_do_not_collide_with_models() {
        for persona in PersonaId::ALL {
            assert!(crate::models::ModelId::from_payload(persona.payload()).is_none());
        }
    }
}
