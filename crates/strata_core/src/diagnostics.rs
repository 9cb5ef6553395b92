//! Accumulated warning and error channels.

/// String-valued warning and error channels filled during a run.
///
/// Nothing here aborts processing; the caller decides after the run whether
/// anything in these channels counts as a failure.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{}", message);
        self.warnings.push(message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::error!("{}", message);
        self.errors.push(message);
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}
