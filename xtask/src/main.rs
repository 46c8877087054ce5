use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::Command;
use uartflash_core::protocol::CHUNK_SIZE;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Tasks for the project", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the project
    Build,
    /// Run all tests
    Test,
    /// Run the CLI, passing any extra arguments through
    Run {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Write a sequential test image (byte i = i mod 256)
    GenImage {
        /// Image size in bytes
        #[arg(long, default_value_t = 4 * CHUNK_SIZE + 44)]
        size: usize,
        /// Output file
        #[arg(long, default_value = "data.bin")]
        out: PathBuf,
    },
}

fn cargo(args: &[&str], what: &str) -> Result<()> {
    let status = Command::new("cargo").args(args).status()?;
    if !status.success() {
        anyhow::bail!("{} failed", what);
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Build => {
            println!("Building project...");
            cargo(&["build", "--workspace"], "Build")?;
        }
        Commands::Test => {
            println!("Running tests...");
            cargo(&["test", "--workspace"], "Test")?;
        }
        Commands::Run { args } => {
            println!("Running CLI...");
            let mut full = vec!["run", "-p", "uartflash-cli", "--"];
            full.extend(args.iter().map(String::as_str));
            cargo(&full, "Run")?;
        }
        Commands::GenImage { size, out } => {
            if *size == 0 {
                anyhow::bail!("image size must be at least 1 byte");
            }
            let data: Vec<u8> = (0..*size).map(|i| (i % 256) as u8).collect();
            std::fs::write(out, &data).with_context(|| format!("writing {}", out.display()))?;
            println!(
                "Wrote {} bytes ({} chunks) to {}",
                size,
                size.div_ceil(CHUNK_SIZE),
                out.display()
            );
        }
    }

    Ok(())
}
