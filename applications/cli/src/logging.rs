//! Tracing setup: stderr plus the rotating download log under `S`.

use crate::config::AppConfig;
use smm_sync::DownloadLog;
use std::fs;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Filter directive for the configured level; `RUST_LOG` wins when set.
pub fn default_directive(level: &str) -> String {
    format!(
        "smm={level},smm_cli={level},smm_sync={level},smm_client={level},smm_playback={level}",
        level = level.to_lowercase()
    )
}

/// Install the global subscriber.
///
/// The download log lives in the smm directory, which is created if needed.
/// If it cannot be created, logging falls back to stderr only.
pub fn init(config: &AppConfig) {
    let layout = config.layout();

    let download_log = match fs::create_dir_all(layout.smm_root()) {
        Ok(()) => Some(
            fmt::layer()
                .with_writer(DownloadLog::new(layout.log_path(), layout.old_log_path()))
                .with_ansi(false)
                .with_target(false)
                .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string())),
        ),
        Err(e) => {
            eprintln!(
                "can't create {}: {}; download log disabled",
                layout.smm_root().display(),
                e
            );
            None
        }
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive(&config.log.level).into()),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(download_log)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_covers_workspace_crates() {
        let directive = default_directive("DEBUG");
        assert!(directive.contains("smm_sync=debug"));
        assert!(directive.contains("smm_client=debug"));
        assert!(EnvFilter::try_new(directive).is_ok());
    }
}
