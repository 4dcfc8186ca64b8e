//! Token-aware text splitting for `JuriFlow`.
//!
//! Documents are split into chunks whose size is measured in *tokens* of the
//! embedding model's tokenizer, not characters, so chunks fit embedding and
//! context windows predictably.
//!
//! # Example
//!
//! ```
//! use juriflow_splitters::{TextSplitter, TokenTextSplitter};
//!
//! let splitter = TokenTextSplitter::cl100k()
//!     .unwrap()
//!     .with_chunk_size(500)
//!     .with_chunk_overlap(50)
//!     .build()
//!     .unwrap();
//!
//! let chunks = splitter.split_text("First paragraph.\n\nSecond paragraph.");
//! assert!(!chunks.is_empty());
//! ```

mod error;
mod recursive;
mod token;
mod traits;

pub use error::{Error, Result};
pub use recursive::TokenTextSplitter;
pub use token::TokenCounter;
pub use traits::{LengthFn, TextSplitter};
