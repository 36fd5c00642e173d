use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use virtxmlctl::{cmd_clear, cmd_domain, cmd_get, cmd_nodedev, cmd_set};

#[derive(Parser, Debug)]
#[command(name = "virtxmlctl", version, about = "Inspect and edit libvirt XML documents")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    /// Output JSON where applicable
    #[arg(long)]
    json: bool,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Parse a node device description
    Nodedev { file: PathBuf },
    /// Summarise a domain definition
    Domain { file: PathBuf },
    /// Print the content at an XPath
    Get { file: PathBuf, xpath: String },
    /// Set the content at an XPath, creating missing elements
    Set {
        file: PathBuf,
        xpath: String,
        value: String,
        /// Rewrite the file instead of printing the result
        #[arg(short, long)]
        in_place: bool,
    },
    /// Remove the node at an XPath along with emptied parents
    Clear {
        file: PathBuf,
        xpath: String,
        #[arg(short, long)]
        in_place: bool,
    },
}

fn main() -> Result<()> {
    let Cli { verbose, json, cmd } = Cli::parse();

    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| level.into()),
        ))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cmd {
        Cmd::Nodedev { file } => cmd_nodedev::run(&file, json)?,
        Cmd::Domain { file } => cmd_domain::run(&file, json)?,
        Cmd::Get { file, xpath } => cmd_get::run(&file, &xpath, json)?,
        Cmd::Set {
            file,
            xpath,
            value,
            in_place,
        } => cmd_set::run(&file, &xpath, &value, in_place)?,
        Cmd::Clear {
            file,
            xpath,
            in_place,
        } => cmd_clear::run(&file, &xpath, in_place)?,
    };

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_nodedev_json() {
        let cli = Cli::parse_from(["virtxmlctl", "--json", "nodedev", "dev.xml"]);
        assert!(cli.json);
        match cli.cmd {
            Cmd::Nodedev { file } => assert_eq!(file, PathBuf::from("dev.xml")),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn parse_set_args() {
        let cli = Cli::parse_from([
            "virtxmlctl",
            "-vv",
            "set",
            "guest.xml",
            "/domain/memory",
            "1048576",
            "--in-place",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.cmd {
            Cmd::Set {
                file,
                xpath,
                value,
                in_place,
            } => {
                assert_eq!(file, PathBuf::from("guest.xml"));
                assert_eq!(xpath, "/domain/memory");
                assert_eq!(value, "1048576");
                assert!(in_place);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn parse_clear_defaults() {
        let cli = Cli::parse_from(["virtxmlctl", "clear", "guest.xml", "./features/pae"]);
        match cli.cmd {
            Cmd::Clear { in_place, xpath, .. } => {
                assert!(!in_place);
                assert_eq!(xpath, "./features/pae");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
