// Assignment extraction core.
// Implements: prompting, response normalization, validation, time estimation.
// All LLM calls go through llm_client; nothing here touches persistence.

pub mod estimator;
pub mod handlers;
pub mod normalizer;
pub mod orchestrator;
pub mod prompts;
pub mod types;
pub mod validator;
