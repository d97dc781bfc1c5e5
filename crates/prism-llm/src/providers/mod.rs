//! Concrete provider adapters
//!
//! Each adapter translates the gateway's normalized chat types to one
//! vendor's wire format, attaches authentication, enforces its own
//! request timeout, and classifies vendor errors. Adapters never retry.

pub mod gemini;
pub mod groq;
pub mod huggingface;

pub use gemini::GeminiProvider;
pub use groq::GroqProvider;
pub use huggingface::HuggingFaceProvider;

/// Adapter-internal request timeout when the descriptor does not set one.
pub(crate) const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 12_000;
