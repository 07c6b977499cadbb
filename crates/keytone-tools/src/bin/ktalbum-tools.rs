//! Inspect `.ktalbum` containers.
//!
//! - `info <file>`: verify the container and print its metadata
//! - `extract <file> -o <zip>`: write the verified zip payload

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use keytone_sign::store::MemoryStore;
use keytone_sign::{KernelConfig, KeyRing, SignatureKernel};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect KeyTone .ktalbum files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the album name, version, export time and UUID.
    Info {
        /// The `.ktalbum` file.
        file: PathBuf,
    },

    /// Write the decrypted zip payload.
    Extract {
        /// The `.ktalbum` file.
        file: PathBuf,

        /// Output zip path.
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    keytone_tools::init_logging();
    let cli = Cli::parse();
    let kernel = SignatureKernel::new(
        MemoryStore::new(),
        KeyRing::from_build(),
        KernelConfig::default(),
    );

    match cli.command {
        Commands::Info { file } => show_info(&kernel, &file)?,
        Commands::Extract { file, output } => extract(&kernel, &file, &output)?,
    }
    Ok(())
}

fn show_info(kernel: &SignatureKernel<MemoryStore>, file: &Path) -> Result<()> {
    let info = kernel
        .album_info(file)
        .with_context(|| format!("read {}", file.display()))?;
    println!("Album name:  {}", info.name);
    println!("Version:     {}", info.format_version);
    println!("Container:   v{} (key v{})", info.container_version, info.key_version);
    println!("Export time: {}", info.export_time);
    println!("Album UUID:  {}", info.album_uuid);
    Ok(())
}

fn extract(kernel: &SignatureKernel<MemoryStore>, file: &Path, output: &Path) -> Result<()> {
    let zip = kernel
        .extract_album_zip(file)
        .with_context(|| format!("read {}", file.display()))?;
    fs::write(output, &zip).with_context(|| format!("write {}", output.display()))?;
    info!(bytes = zip.len(), output = %output.display(), "payload extracted");
    Ok(())
}
