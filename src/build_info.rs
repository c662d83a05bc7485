/// Build-time metadata exposed at runtime.
pub const BUILD_VERSION: &str = env!("APP_BUILD_VERSION");
pub const BUILD_COMMIT: &str = env!("APP_BUILD_COMMIT");
pub const BUILD_TIMESTAMP: &str = env!("APP_BUILD_TIMESTAMP");

/// Cargo version plus build metadata, shown by the health endpoint and CLI.
pub fn summary() -> String {
    format!(
        "omr-server {} (build {}, commit {}, built at {})",
        env!("CARGO_PKG_VERSION"),
        BUILD_VERSION,
        BUILD_COMMIT,
        BUILD_TIMESTAMP
    )
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_summary_mentions_package_version() {
        assert!(super::summary().contains(env!("CARGO_PKG_VERSION")));
    }
}
