//! Build warning sink.

/// Collects build warnings and mirrors each one to the log.
#[derive(Debug, Default, Clone)]
pub struct Warnings {
    messages: Vec<String>,
}

impl Warnings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{message}");
        self.messages.push(message);
    }

    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        self.messages
    }
}
