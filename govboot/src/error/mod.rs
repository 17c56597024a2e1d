//! govboot error handling utilities
//!
//! Every error enum in the crate is declared with `#[govboot_error]`, which combines:
//! - Strongly typed variants for the failures a step can name precisely
//! - A `Generic` variant that carries a flattened `anyhow` error chain

pub use govboot_macros::govboot_error;

/// Re-export anyhow for convenience
pub use anyhow;

/// Helper trait for converting anyhow errors to generic error messages
pub trait AnyhowErrorExt {
    /// Convert an anyhow error to a string, preserving the error chain
    fn to_generic_message(self) -> String;

    /// Convert an anyhow error to a string with a custom prefix
    fn to_generic_message_with_prefix(self, prefix: &str) -> String;
}

impl AnyhowErrorExt for anyhow::Error {
    fn to_generic_message(self) -> String {
        let mut message = self.to_string();

        let chain: Vec<String> = self.chain().skip(1).map(ToString::to_string).collect();
        if !chain.is_empty() {
            message.push_str(" (caused by: ");
            message.push_str(&chain.join(" -> "));
            message.push(')');
        }

        message
    }

    fn to_generic_message_with_prefix(self, prefix: &str) -> String {
        format!("{prefix}: {}", self.to_generic_message())
    }
}
