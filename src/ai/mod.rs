//! AI Integration Layer
//!
//! Generation providers, the fallback chain, refill prompts and response
//! decoding.

pub mod prompt;
pub mod provider;
pub mod timeout;
pub mod validation;

pub use prompt::{PromptBuilder, PromptSection, refill_prompt};
pub use provider::{
    ChainAttemptResult, ChainConfig, ChainStats, GeminiProvider, GenerationProvider, GroqProvider,
    ProviderChain, ProviderChainBuilder, ProviderConfig, ProviderKind, ProviderResult,
    SharedProvider, create_provider,
};
pub use timeout::{with_optional_timeout, with_timeout};
pub use validation::{PayloadShape, extract_problems, normalize};
