pub mod deck;
pub mod memory;
pub mod study;

use thiserror::Error;

/// Raised when a text column holds a value outside a known enum.
#[derive(Debug, Error)]
#[error("unknown {kind} value '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}
