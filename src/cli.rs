use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "quote-sync")]
#[command(author, version, about = "Refresh instrument quotes on notification and announce the update", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Directory holding default.toml and per-environment overrides
    #[arg(short, long, env = "QUOTE_SYNC_CONFIG_DIR", default_value = "config")]
    pub config_dir: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Accept notifications over HTTP (default)
    Serve {
        /// Override server.bind
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Run the pipeline once for a symbol and exit
    Sync {
        symbol: String,
    },
    /// Run the pipeline once for a raw notification or envelope body
    Notify {
        /// JSON body, e.g. '{"symbol":"NN.AS"}'
        body: String,
        /// Treat the body as a transport envelope
        #[arg(long)]
        envelope: bool,
    },
    /// Print the stored quote for a symbol
    Quote {
        symbol: String,
    },
}
