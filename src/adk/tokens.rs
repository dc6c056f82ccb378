// SPDX-License-Identifier: MIT

//! Token budget guard
//!
//! Checks a rendered prompt against the target model's context window before
//! the model is called. Going over budget is an expected outcome reported as
//! text, not an error.

use crate::adk::model::{Content, Model};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tiktoken_rs::CoreBPE;

/// Context window used for models missing from the lookup table
pub const DEFAULT_CONTEXT_WINDOW: usize = 4097;

/// Tokenizers by model name; `None` records that no tokenizer exists.
static TOKENIZERS: Lazy<Mutex<HashMap<String, Option<Arc<CoreBPE>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Outcome of a pre-flight budget check
#[derive(Debug, Clone, PartialEq)]
pub enum GuardOutcome {
    /// The prompt fits; call the model
    Proceed,
    /// The prompt is too large; the diagnostic replaces the model's answer
    Abort(String),
}

/// Known context window for a model identifier
pub fn context_window(model_name: &str) -> usize {
    match model_name {
        "gpt-4o" | "gpt-4o-mini" | "gpt-4-turbo" | "gpt-4-1106-preview"
        | "gpt-4-vision-preview" => 128000,
        "gpt-4-32k" => 32768,
        "gpt-4" => 8192,
        "gpt-3.5-turbo-1106" => 16385,
        "gpt-3.5-turbo-16k" => 16384,
        "gpt-3.5-turbo" => 4096,
        "text-davinci-003" => 4097,
        "code-davinci-002" => 8000,
        "text-curie-001" | "text-babbage-001" | "text-ada-001" | "code-cushman-001" => 2048,
        _ => DEFAULT_CONTEXT_WINDOW,
    }
}

fn tokenizer_for(model_name: &str) -> Option<Arc<CoreBPE>> {
    if let Some(cached) = lock_tokenizers().get(model_name) {
        return cached.clone();
    }

    // building a BPE is slow; never hold the lock across it
    let built = tiktoken_rs::get_bpe_from_model(model_name).ok().map(Arc::new);
    lock_tokenizers()
        .entry(model_name.to_string())
        .or_insert(built)
        .clone()
}

fn lock_tokenizers() -> MutexGuard<'static, HashMap<String, Option<Arc<CoreBPE>>>> {
    match TOKENIZERS.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Character based estimate: one token per four characters, rounded up
pub fn approximate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Number of tokens in `text` for the given model.
///
/// Falls back to [`approximate_tokens`] when no tokenizer is known.
pub fn count_tokens(text: &str, model_name: &str) -> usize {
    match tokenizer_for(model_name) {
        Some(bpe) => bpe.encode_with_special_tokens(text).len(),
        None => {
            log::warn!(
                "No tokenizer for model '{}', falling back to approximate count",
                model_name
            );
            approximate_tokens(text)
        }
    }
}

/// Context window minus prompt size; negative when the prompt does not fit
pub fn remaining_tokens(prompt: &str, model: &dyn Model) -> i64 {
    let used = count_tokens(prompt, model.model_name()) as i64;
    model.context_window() as i64 - used
}

/// Pre-flight check for a rendered prompt
pub fn guard(prompt: &str, model: &dyn Model) -> GuardOutcome {
    let remaining = remaining_tokens(prompt, model);
    if remaining < 0 {
        let overage = -remaining;
        log::warn!(
            "Prompt for '{}' exceeds the context window by {} tokens",
            model.model_name(),
            overage
        );
        GuardOutcome::Abort(format!(
            "Your input exceeds the maximum number of tokens for this model by {}.",
            overage
        ))
    } else {
        GuardOutcome::Proceed
    }
}

/// Flatten a message history into the text the model will see
pub fn render_prompt(history: &[Content]) -> String {
    history
        .iter()
        .map(|c| format!("{}: {}", c.role, c.to_display_text()))
        .collect::<Vec<_>>()
        .join("\n")
}
