//! Single-use status messages carried across a redirect.

/// Pending `error` and `success` messages for a session.
///
/// Messages are set by a handler and consumed by the next rendered page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flash {
    pub error: Option<String>,
    pub success: Option<String>,
}

impl Flash {
    /// Replaces the pending error message.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    /// Replaces the pending success message.
    pub fn set_success(&mut self, message: impl Into<String>) {
        self.success = Some(message.into());
    }

    /// Returns the pending messages and clears them.
    pub fn take(&mut self) -> Flash {
        std::mem::take(self)
    }

    /// Returns true if no message is pending.
    pub fn is_empty(&self) -> bool {
        self.error.is_none() && self.success.is_none()
    }
}
