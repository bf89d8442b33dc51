use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Subcommand)]
pub enum Command {
  /// Pack a directory tree into an ISO 9660 image
  Create {
    /// Output image path
    output: PathBuf,
    /// Directory whose contents become the image root
    directory: PathBuf,
    /// Volume identifier recorded in the primary descriptor
    #[arg(long, default_value = "UNNAMED")]
    volume_id: String,
  },
}

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
  #[command(subcommand)]
  pub command: Command,
}
