// src/utils/log.rs

//! Logging setup for the recognition library.
//!
//! Library code logs through the `log` facade (`log::debug!`, `log::info!`, ...).
//! Applications that have no logger of their own can install the bundled
//! `tracing-subscriber` formatter, which also picks up `log` records.
//!
//! ```
//! kanji_ocr::utils::log::init_subscriber(kanji_ocr::utils::log::Level::DEBUG);
//! log::debug!("segmentation started");
//! ```

pub use log::{debug, error, info, trace, warn};
pub use tracing::Level;

/// Initializes a global logging subscriber.
///
/// This should be called once at the beginning of the program's execution.
/// Messages are written to standard error with thread ids, since recognition
/// runs on worker threads.
///
/// Returns `false` if a global subscriber or logger was already installed.
///
/// # Arguments
/// * `max_level` - The maximum level of messages to log (e.g., `Level::INFO`, `Level::DEBUG`).
pub fn init_subscriber(max_level: Level) -> bool {
    tracing_subscriber::fmt()
        .with_max_level(max_level)
        .with_thread_ids(true)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        let _ = init_subscriber(Level::WARN);
        assert!(!init_subscriber(Level::WARN));
    }
}
