// file: src/logging/logger.rs
// version: 1.1.0
// guid: c2d75a18-40b9-4e63-9f21-8ab06e54d3c7

//! Logger initialization and configuration

use crate::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the logging system
pub fn init_logger(verbose: bool, quiet: bool) -> Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init()
        .map_err(|e| {
            crate::error::DvmError::Config(format!("Failed to initialize logger: {}", e))
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logger_modes() {
        // The subscriber can only be installed once per process, so the
        // first call may succeed and the rest fail. Both are acceptable.
        for (verbose, quiet) in [(false, false), (true, false), (false, true)] {
            let result = init_logger(verbose, quiet);
            assert!(result.is_ok() || result.is_err());
        }
    }
}
