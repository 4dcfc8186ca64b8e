//! Token counting backed by `tiktoken`.

use std::sync::Arc;

use tiktoken_rs::{cl100k_base, get_bpe_from_model, CoreBPE};

use crate::error::{Error, Result};
use crate::traits::LengthFn;

/// A shareable token counter for one tokenizer.
#[derive(Clone)]
pub struct TokenCounter {
    bpe: Arc<CoreBPE>,
    model: String,
}

impl TokenCounter {
    /// Counter for the tokenizer of the given model, falling back to
    /// `cl100k_base` for models tiktoken does not know.
    pub fn for_model(model: &str) -> Result<Self> {
        let bpe = match get_bpe_from_model(model) {
            Ok(bpe) => bpe,
            Err(_) => cl100k_base().map_err(|e| Error::Tokenizer(e.to_string()))?,
        };
        Ok(Self {
            bpe: Arc::new(bpe),
            model: model.to_string(),
        })
    }

    /// Counter over the `cl100k_base` vocabulary used by the embedding
    /// models this service targets.
    pub fn cl100k() -> Result<Self> {
        let bpe = cl100k_base().map_err(|e| Error::Tokenizer(e.to_string()))?;
        Ok(Self {
            bpe: Arc::new(bpe),
            model: "cl100k_base".to_string(),
        })
    }

    /// Number of tokens in `text`.
    pub fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// A length function closing over this counter.
    pub fn length_fn(&self) -> LengthFn {
        let counter = self.clone();
        Arc::new(move |text: &str| counter.count(text))
    }
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCounter")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}
