use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "geosubmit")]
#[command(about = "Geolocation submission service", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to $GEOSUBMIT_CONFIG or config/geosubmit.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server
    Server(ServerArgs),
    /// Normalize a geosubmit JSON batch file offline and print the result
    Normalize(NormalizeArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServerArgs {
    /// Address to bind the HTTP server to (overrides server.bind_addr)
    #[arg(long)]
    pub address: Option<SocketAddr>,
}

#[derive(clap::Args, Debug)]
pub struct NormalizeArgs {
    /// Path to a JSON document of the form {"items": [...]}
    pub input: PathBuf,

    /// Pretty-print the output
    #[arg(long)]
    pub pretty: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_server_with_global_config() {
        let cli = Cli::try_parse_from([
            "geosubmit",
            "server",
            "--address",
            "127.0.0.1:9000",
            "--config",
            "local.toml",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("local.toml")));
        match cli.command {
            Commands::Server(args) => {
                assert_eq!(args.address, Some("127.0.0.1:9000".parse().unwrap()))
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_normalize() {
        let cli =
            Cli::try_parse_from(["geosubmit", "normalize", "batch.json", "--pretty"]).unwrap();
        match cli.command {
            Commands::Normalize(args) => {
                assert_eq!(args.input, PathBuf::from("batch.json"));
                assert!(args.pretty);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
