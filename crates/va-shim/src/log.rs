//! Log destination selection, per spec §6: a single environment variable
//! chooses stderr vs. append-to-path. No other environment or
//! configuration file is read. Initialised once, the first time any
//! consumer opens the driver (`vaDriverInit`).

use std::sync::Once;

const LOG_ENV_VAR: &str = "VA_M2M_SHIM_LOG";

static INIT: Once = Once::new();

/// Initialises the global `tracing` subscriber exactly once per process,
/// regardless of how many times `vaDriverInit` is called (one per display
/// connection). `RUST_LOG` still overrides the computed default directive,
/// matching the teacher's `EnvFilter::try_from_default_env()` fallback
/// pattern.
pub fn init() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "va_m2m_shim_drv_video=info,headers=info,m2m=info".into());

        let builder = tracing_subscriber::fmt().with_env_filter(filter);

        match std::env::var(LOG_ENV_VAR) {
            Ok(v) if v == "1" => {
                builder.with_writer(std::io::stderr).init();
            }
            Ok(path) if !path.is_empty() => {
                if let Ok(file) = std::fs::OpenOptions::new().create(true).append(true).open(&path) {
                    builder.with_writer(std::sync::Mutex::new(file)).init();
                } else {
                    builder.with_writer(std::io::stderr).init();
                }
            }
            _ => {
                // No env var set: the VA dispatcher's own logging (if any)
                // is authoritative; we still install a subscriber so that
                // `tracing::*` calls from this crate don't panic when no
                // global default has been set, but write nowhere useful
                // by defaulting to stderr at a quiet level.
                builder.with_writer(std::io::stderr).init();
            }
        }
    });
}
