use std::fmt;

/// A logger scoped to one proxy type generation.
///
/// Every event carries the name of the proxy type being generated as the
/// `proxy` field, so a single subscriber filter can follow one synthesis
/// request across the member model, the contributors and the cache.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GenerationLog<'a> {
    proxy: &'a str,
}

impl<'a> GenerationLog<'a> {
    pub(crate) fn new(proxy: &'a str) -> Self {
        Self { proxy }
    }

    /// Returns the proxy type name attached to every event.
    #[cfg(test)]
    pub(crate) fn proxy(&self) -> &str {
        self.proxy
    }

    /// Logs a debug-level message with the proxy name.
    pub(crate) fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(proxy = %self.proxy, "{}", args);
    }

    /// Logs a trace-level message with the proxy name.
    pub(crate) fn trace(&self, args: fmt::Arguments<'_>) {
        tracing::trace!(proxy = %self.proxy, "{}", args);
    }

    /// Logs a warning-level message with the proxy name.
    pub(crate) fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(proxy = %self.proxy, "{}", args);
    }
}
