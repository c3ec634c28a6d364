use std::sync::OnceLock;

/// Stack capture and rendering settings read from the environment.
///
/// The environment is read once, on first use.
///
/// - `RUST_BACKTRACE=full` turns off the default cleaner, so rendered traces
///   show every frame with its full path.
/// - `FAULTLINE_BACKTRACE` takes comma-separated options:
///   - `off`: snapshots record no frame addresses (locations and messages
///     are still kept)
///   - `full_paths`: keep full file paths in rendered frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackConfig {
    /// `RUST_BACKTRACE=full` was set.
    pub rust_backtrace_full: bool,
    /// Frame capture is turned off.
    pub capture_disabled: bool,
    /// Rendered frames keep their full file paths.
    pub show_full_path: bool,
}

impl StackConfig {
    /// The process-wide configuration.
    pub fn get() -> &'static Self {
        static CONFIG: OnceLock<StackConfig> = OnceLock::new();

        CONFIG.get_or_init(|| {
            Self::parse(
                std::env::var_os("RUST_BACKTRACE")
                    .as_deref()
                    .and_then(|var| var.to_str()),
                std::env::var_os("FAULTLINE_BACKTRACE")
                    .as_deref()
                    .and_then(|var| var.to_str()),
            )
        })
    }

    fn parse(rust_backtrace: Option<&str>, faultline_backtrace: Option<&str>) -> Self {
        let rust_backtrace_full = rust_backtrace == Some("full");
        let mut config = Self {
            rust_backtrace_full,
            capture_disabled: false,
            show_full_path: rust_backtrace_full,
        };
        for option in faultline_backtrace.unwrap_or_default().split(',') {
            let option = option.trim();
            if option.eq_ignore_ascii_case("off") {
                config.capture_disabled = true;
            } else if option.eq_ignore_ascii_case("full_paths") {
                config.show_full_path = true;
            }
        }
        config
    }
}
