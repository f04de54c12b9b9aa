//! Tracing subscriber initialization.
//!
//! Access decisions and grant writes are logged as JSON events carrying
//! `actor_id`, `user_id`, `company_id` and the change being applied.

use tracing_subscriber::EnvFilter;

/// Environment variable read for filter directives.
pub const FILTER_VAR: &str = "RUST_LOG";

pub fn init() {
    init_with_default_filter("info");
}

/// Initialize with `default` directives when `RUST_LOG` is unset or invalid.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init_with_default_filter(default: &str) {
    let filter = filter_or(default);

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}

fn filter_or(default: &str) -> EnvFilter {
    filter_from(std::env::var(FILTER_VAR).ok().as_deref(), default)
}

/// `directives` when present and valid, otherwise `default`.
fn filter_from(directives: Option<&str>, default: &str) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(default))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_harmless() {
        init();
        init_with_default_filter("debug");
    }

    #[test]
    fn unset_directives_fall_back_to_the_default() {
        let filter = filter_from(None, "permgate_infra=debug");
        assert_eq!(filter.to_string(), "permgate_infra=debug");
    }

    #[test]
    fn invalid_directives_fall_back_to_the_default() {
        let filter = filter_from(Some("permgate_infra=loud"), "warn");
        assert_eq!(filter.to_string(), "warn");
    }

    #[test]
    fn valid_directives_win_over_the_default() {
        let filter = filter_from(Some("permgate_auth=trace"), "warn");
        assert_eq!(filter.to_string(), "permgate_auth=trace");
    }
}
