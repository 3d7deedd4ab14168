//! CLI module for Coinforge
//!
//! - `serve`: run the HTTP API
//! - `convert`: run the image to GLB pipeline on a local file

pub mod convert;
pub mod serve;

use clap::{Parser, Subcommand};

/// Coinforge - coin and patch design generation with 3D relief export
#[derive(Parser)]
#[command(name = "coinforge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the API server
    Serve,

    /// Convert a design image into a GLB relief model
    Convert(convert::ConvertArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_convert() {
        let cli = Cli::try_parse_from([
            "coinforge", "convert", "--input", "in.png", "--output", "out.glb", "--finish", "silver",
        ])
        .unwrap();

        match cli.command {
            Command::Convert(args) => {
                assert_eq!(args.input.to_str(), Some("in.png"));
                assert_eq!(args.finish, convert::FinishArg::Silver);
                assert!(!args.reject_empty);
            }
            Command::Serve => panic!("expected convert"),
        }
    }

    #[test]
    fn test_convert_requires_paths() {
        assert!(Cli::try_parse_from(["coinforge", "convert", "--input", "in.png"]).is_err());
    }
}
