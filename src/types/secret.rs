// ABOUTME: Wrapper for credential material that never prints its contents.
// ABOUTME: Debug is redacted and there is no Display, so secrets cannot leak through formatting.

use std::fmt;

/// A secret string (registry token, password, identity token).
///
/// The value is only reachable through [`Secret::expose`], which keeps every
/// use site greppable.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Replace every occurrence of this secret in `text` with a placeholder.
    ///
    /// Runtime and registry error messages are passed through this before they
    /// are surfaced, in case the engine echoes request data back.
    pub fn scrub(&self, text: &str) -> String {
        if self.0.is_empty() {
            return text.to_string();
        }
        text.replace(&self.0, "***")
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}
