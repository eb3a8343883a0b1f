//! Logging setup for strata applications.
//!
//! Library crates only emit [`tracing`] events; installing a subscriber is
//! the application's job, done once at bootstrap with [`setup_logging`].

use crate::settings::Settings;

/// Installs the global tracing subscriber described by `settings`.
///
/// The filter comes from `settings.log_level` and falls back to "info" when
/// the directive does not parse. Debug mode uses pretty output; otherwise
/// events are written as JSON. Calling this more than once is harmless: later
/// calls leave the first subscriber in place.
pub fn setup_logging(settings: &Settings) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if settings.debug {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .pretty()
            .try_init()
            .ok();
    } else {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .try_init()
            .ok();
    }
}

/// Creates a span for one admin operation on a model.
///
/// ```
/// use strata_core::logging::admin_span;
///
/// let span = admin_span("Post", "change");
/// let _guard = span.enter();
/// tracing::info!("updating post");
/// ```
pub fn admin_span(model: &str, action: &str) -> tracing::Span {
    tracing::info_span!("admin", model = model, action = action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_logging_twice_does_not_panic() {
        let mut settings = Settings::default();
        settings.log_level = "not a [valid directive".to_string();
        setup_logging(&settings);
        settings.debug = false;
        setup_logging(&settings);
    }

    #[test]
    fn test_admin_span_enters() {
        let span = admin_span("Post", "view");
        let _guard = span.enter();
        tracing::debug!("inside admin span");
    }
}
