//! Deduplicating warning sink

use std::collections::HashSet;

/// Collects warnings raised while extracting, emitting each distinct message once
///
/// Components receive the sink explicitly instead of sharing global state. A
/// message is logged through `tracing` the first time it is seen; repeats are
/// counted but not logged again.
#[derive(Debug, Default)]
pub struct Diagnostics {
    seen: HashSet<String>,
    warnings: Vec<String>,
    suppressed: usize,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning; returns `true` if it had not been seen before
    pub fn warn(&mut self, message: impl Into<String>) -> bool {
        let message = message.into();
        if self.seen.contains(&message) {
            self.suppressed += 1;
            return false;
        }

        tracing::warn!("{}", message);
        self.seen.insert(message.clone());
        self.warnings.push(message);
        true
    }

    /// Distinct warnings in the order they were first raised
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Number of duplicate warnings that were suppressed
    pub fn suppressed(&self) -> usize {
        self.suppressed
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.warnings.iter().any(|w| w.contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_warnings_are_suppressed() {
        let mut diagnostics = Diagnostics::new();

        assert!(diagnostics.warn("Skipping /files since it requires parameters for: id"));
        assert!(!diagnostics.warn("Skipping /files since it requires parameters for: id"));
        assert!(diagnostics.warn("Property was not defined in schema: extra"));

        assert_eq!(diagnostics.warnings().len(), 2);
        assert_eq!(diagnostics.suppressed(), 1);
        assert!(diagnostics.contains("/files"));
    }
}
