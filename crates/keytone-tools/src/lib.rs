//! Shared setup for the KeyTone command-line tools.
//!
//! - `key-obfuscator`: turn a plaintext key into the obfuscated hex that a
//!   private build embeds through the `KEYTONE_*` variables
//! - `ktalbum-tools`: inspect and extract `.ktalbum` containers

use tracing_subscriber::EnvFilter;

/// Install a stderr logger, `info` unless `RUST_LOG` says otherwise.
///
/// Stdout is reserved for command output.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
