use clap::{Parser, Subcommand};

/// promogate: chat-driven quorum approvals for deployment promotions
#[derive(Parser)]
#[command(name = "promogate", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the approval bot and its HTTP API
    Serve {
        /// Port to bind (overrides PROMOGATE_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check whether text is a valid chat command and print how it parses
    Parse { text: String },
}
