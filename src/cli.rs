use clap::{Parser, Subcommand};

/// storefront-notify: live notification sync for the storefront
#[derive(Parser)]
#[command(name = "storefront-notify", version, about)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Follow the live channel and the poll, logging every change
    Watch {
        /// User key for the push destination
        #[arg(short, long, env = "STOREFRONT_USER")]
        user: Option<String>,
    },

    /// Print one page of notifications
    List {
        #[arg(long, default_value = "0")]
        page: u32,
        #[arg(long, default_value = "20")]
        size: u32,
    },

    /// Print the unread total
    Unread,

    /// Mark one notification read
    Read { id: String },

    /// Mark every notification read
    ReadAll,
}
