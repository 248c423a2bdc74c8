//! Tracing setup for the binary and for hosts embedding the engine.
//!
//! - LOG_LEVEL: filter directives, e.g. "info,progression=debug,store=trace".
//! - LOG_FORMAT: "pretty" (default) or "json".
//!
//! Targets: `progression` (reward application, promotions), `badges`,
//! `store`, `tradecraft` (host and configuration).

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,progression=debug,badges=info,store=info,tradecraft=debug,tower_http=info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. Returns false if one was already set
/// (e.g. by a host process), in which case the existing one is kept.
pub fn init_tracing() -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    let installed = match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => builder.json().try_init().is_ok(),
        _ => builder.try_init().is_ok(),
    };
    if !installed {
        tracing::debug!(target: "tradecraft", "Global subscriber already installed; keeping it");
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_keeps_the_first() {
        let _ = init_tracing();
        assert!(!init_tracing());
    }
}
