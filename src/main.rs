use anyhow::{Context, Result};
use clap::Parser;
use log::debug;
use rtunpack::commands;
use rtunpack::config::{CONFIG_ENV, ROOT_ENV};
use rtunpack::naming::NamingScheme;
use rtunpack::runtime::RealRuntime;
use std::path::PathBuf;

/// rtunpack - native runtime unpacker
///
/// Materializes the directories, symlinks and archive contents a set of
/// packages ship for a native runtime, once per package version.
///
/// Examples:
///   rtunpack install                       # Install everything the plan lists
///   rtunpack --root /tmp/rt status         # Show what would be installed
///   rtunpack decode lib__bin__octave.so    # Explain an encoded filename
#[derive(Parser, Debug)]
#[command(author, version = env!("RTUNPACK_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Install plan (defaults to <root>/rtunpack.json; also via RTUNPACK_CONFIG)
    #[arg(
        long = "config",
        short = 'c',
        env = CONFIG_ENV,
        value_name = "PATH",
        global = true
    )]
    pub config: Option<PathBuf>,

    /// Install root directory (overrides the plan; also via RTUNPACK_ROOT)
    #[arg(
        long = "root",
        short = 'r',
        env = ROOT_ENV,
        value_name = "PATH",
        global = true
    )]
    pub install_root: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Install every package whose version marker is missing
    Install,

    /// Show each package's install state without changing anything
    Status,

    /// Explain how an encoded library filename is interpreted
    Decode(DecodeArgs),
}

#[derive(clap::Args, Debug)]
pub struct DecodeArgs {
    /// File name such as lib__bin__octave.so or libzipoctave_1.so
    #[arg(value_name = "FILENAME")]
    pub filename: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = RealRuntime;

    match cli.command {
        Commands::Install => {
            let config = commands::load_config(&runtime, cli.config, cli.install_root)?;
            let report = tokio::task::spawn_blocking(move || commands::install(runtime, config))
                .await
                .context("Install worker stopped unexpectedly")?;
            if !report.ready() {
                std::process::exit(1);
            }
        }
        Commands::Status => {
            let config = commands::load_config(&runtime, cli.config, cli.install_root)?;
            commands::status(runtime, &config)?
        }
        Commands::Decode(args) => {
            let naming = match commands::load_config(&runtime, cli.config, cli.install_root) {
                Ok(config) => config.naming,
                Err(e) => {
                    debug!("Using the default naming scheme: {:#}", e);
                    NamingScheme::default()
                }
            };
            commands::decode(&naming, &args.filename)?
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_install_parsing() {
        let cli = Cli::try_parse_from(["rtunpack", "install"]).unwrap();
        assert!(matches!(cli.command, Commands::Install));
        assert_eq!(cli.install_root, None);
    }

    #[test]
    fn test_cli_config_and_root_parsing() {
        let cli = Cli::try_parse_from([
            "rtunpack",
            "install",
            "--config",
            "/etc/plan.json",
            "--root",
            "/tmp/rt",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/plan.json")));
        assert_eq!(cli.install_root, Some(PathBuf::from("/tmp/rt")));
    }

    #[test]
    fn test_cli_global_root_parsing() {
        let cli = Cli::try_parse_from(["rtunpack", "-r", "/tmp", "status"]).unwrap();
        assert!(matches!(cli.command, Commands::Status));
        assert_eq!(cli.install_root, Some(PathBuf::from("/tmp")));
    }

    #[test]
    fn test_cli_decode_parsing() {
        let cli = Cli::try_parse_from(["rtunpack", "decode", "lib__bin__octave.so"]).unwrap();
        match cli.command {
            Commands::Decode(args) => assert_eq!(args.filename, "lib__bin__octave.so"),
            _ => panic!("Expected Decode command"),
        }
    }

    #[test]
    fn test_cli_decode_requires_filename() {
        assert!(Cli::try_parse_from(["rtunpack", "decode"]).is_err());
    }

    #[test]
    fn test_cli_no_subcommand_fails() {
        assert!(Cli::try_parse_from(["rtunpack"]).is_err());
    }
}
