//! vidfx Assistant
//!
//! Turns a free-text request ("make it brighter and play it twice as fast")
//! into a validated [`Settings`](vidfx_settings::Settings) value:
//! - **Suggestion parsing:** code-fence stripping, JSON parsing and
//!   per-field ingestion with a "partially applied" warning
//! - **Providers:** the text-generation backend behind an async trait, with
//!   an OpenAI-compatible chat-completions client

pub mod provider;
pub mod suggestion;

pub use provider::{suggest, ChatCompletionsProvider, SuggestionProvider};
pub use suggestion::{parse_suggestion, strip_code_fence, Suggestion, PARTIAL_WARNING};
