//! Obfuscate a plaintext key for embedding at build time.
//!
//! ```text
//! KEYTONE_SIGNATURE_KEY_A=$(key-obfuscator --key "my-private-key") cargo build --release
//! ```
//!
//! The hex goes to stdout with no trailing newline; everything else goes
//! to stderr.

use std::io::Write;

use anyhow::{bail, Context, Result};
use clap::Parser;
use keytone_sign::core::{obfuscate, KEY_LEN};
use tracing::warn;

#[derive(Parser, Debug)]
#[command(author, version, about = "XOR-obfuscate a key for a KeyTone build", long_about = None)]
struct Cli {
    /// Plaintext key.
    #[arg(short, long)]
    key: Option<String>,
}

fn main() -> Result<()> {
    keytone_tools::init_logging();
    let cli = Cli::parse();

    let key = match cli.key {
        Some(key) if !key.is_empty() => key,
        _ => bail!("no key given; usage: key-obfuscator --key <plaintext>"),
    };
    if key.len() != KEY_LEN {
        warn!(
            len = key.len(),
            expected = KEY_LEN,
            "key is not {KEY_LEN} bytes; it will be zero-padded or truncated at use"
        );
    }

    let mut stdout = std::io::stdout().lock();
    write!(stdout, "{}", obfuscate(&key)).context("write to stdout")?;
    stdout.flush().context("flush stdout")?;
    Ok(())
}
