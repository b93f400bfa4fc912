//! Turning retrieved context into an answer.

use crate::error::Result;
use crate::search::Retrieved;

const DEFAULT_EMPTY_MESSAGE: &str = "No relevant information found.";

pub trait Generator {
    /// Answer `query` from `context`, which arrives best first.
    fn generate(&self, query: &str, context: &[Retrieved]) -> Result<String>;
}

/// Model-free generator: the context texts joined by single spaces after an
/// optional prefix, or a fixed message when nothing was retrieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcatGenerator {
    prefix: String,
    empty_message: String,
}

impl Default for ConcatGenerator {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            empty_message: DEFAULT_EMPTY_MESSAGE.to_string(),
        }
    }
}

impl ConcatGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_empty_message(mut self, message: impl Into<String>) -> Self {
        self.empty_message = message.into();
        self
    }
}

impl Generator for ConcatGenerator {
    fn generate(&self, _query: &str, context: &[Retrieved]) -> Result<String> {
        if context.is_empty() {
            return Ok(self.empty_message.clone());
        }
        let joined = context
            .iter()
            .map(|r| r.document.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Ok(format!("{}{}", self.prefix, joined))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn retrieved(texts: &[&str]) -> Vec<Retrieved> {
        texts
            .iter()
            .enumerate()
            .map(|(position, text)| Retrieved {
                position,
                distance: None,
                document: Document::new(*text),
            })
            .collect()
    }

    #[test]
    fn empty_context_gives_the_fallback_message() {
        let plain = ConcatGenerator::new();
        assert_eq!(
            plain.generate("anything", &[]).unwrap(),
            "No relevant information found."
        );

        let polite = ConcatGenerator::new()
            .with_prefix("Based on the retrieved documents: ")
            .with_empty_message("I'm sorry, I couldn't find any relevant information.");
        assert_eq!(
            polite.generate("anything", &[]).unwrap(),
            "I'm sorry, I couldn't find any relevant information."
        );
    }

    #[test]
    fn context_is_joined_in_order_after_the_prefix() {
        let context = retrieved(&["RAG combines retrieval.", "LangChain builds apps."]);
        assert_eq!(
            ConcatGenerator::new().generate("q", &context).unwrap(),
            "RAG combines retrieval. LangChain builds apps."
        );
        assert_eq!(
            ConcatGenerator::new()
                .with_prefix("Based on the retrieved documents: ")
                .generate("q", &context)
                .unwrap(),
            "Based on the retrieved documents: RAG combines retrieval. LangChain builds apps."
        );
    }
}
