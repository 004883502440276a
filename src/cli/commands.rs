//! CLI command definitions: the CLI is a thin adapter sending commands
//! into a running node; identity/order/negotiation/settlement
//! subcommands mirror the node's own component set.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "blacktrace")]
#[command(about = "BlackTrace - peer-to-peer OTC settlement for cross-chain atomic swaps", long_about = None)]
pub struct Cli {
    /// Path to a TOML config file; defaults are used for anything absent.
    #[arg(short = 'f', long, default_value = "blacktrace.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a BlackTrace node
    Node {
        /// Multiaddr to dial on startup (optional)
        #[arg(short = 'c', long)]
        connect: Option<String>,
    },

    /// Manage a local identity
    Identity {
        #[command(subcommand)]
        action: IdentityAction,
    },

    /// Create and manage orders
    Order {
        #[command(subcommand)]
        action: OrderAction,
    },

    /// Negotiate terms against an order
    Negotiate {
        #[command(subcommand)]
        action: NegotiateAction,
    },

    /// Inspect settlement progress
    Settlement {
        #[command(subcommand)]
        action: SettlementAction,
    },

    /// Query node state
    Query {
        #[command(subcommand)]
        action: QueryAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum IdentityAction {
    /// Register a new local user
    Register {
        username: String,
        #[arg(short, long)]
        password: String,
    },

    /// Log in, printing a session id
    Login {
        username: String,
        #[arg(short, long)]
        password: String,
    },

    /// Show the active session
    Whoami { session_id: String },

    /// Invalidate a session
    Logout { session_id: String },
}

#[derive(Subcommand, Debug)]
pub enum OrderAction {
    /// Create a new sell order
    Create {
        #[arg(long)]
        maker_user: String,

        /// Source asset ticker (e.g. ZEC)
        #[arg(long)]
        source_asset: String,

        /// Destination stablecoin (USDC, USDT, DAI)
        #[arg(long)]
        dest_asset: String,

        #[arg(short, long)]
        amount: u64,

        #[arg(short = 'p', long)]
        min_price: u64,

        #[arg(short = 'P', long)]
        max_price: u64,

        /// If given, the order details are ECIES-sealed to this user's
        /// registered pubkey instead of left for open discovery.
        #[arg(short = 't', long)]
        target_user: Option<String>,
    },

    /// List all known orders
    List,
}

#[derive(Subcommand, Debug)]
pub enum NegotiateAction {
    /// Propose a price against an order
    Propose {
        order_id: String,
        #[arg(short, long)]
        proposer_user: String,
        #[arg(short, long)]
        price: u64,
        #[arg(short, long)]
        amount: u64,
    },

    /// Accept a proposal, starting settlement. Signed with the accepting
    /// user's own session identity key, not the node's transport key.
    Accept {
        order_id: String,
        proposal_id: String,
        #[arg(short, long)]
        session_id: String,
    },

    /// Reject a proposal
    Reject { order_id: String, proposal_id: String },
}

#[derive(Subcommand, Debug)]
pub enum SettlementAction {
    /// Show a settlement record's status
    Status { proposal_id: String },
}

#[derive(Subcommand, Debug)]
pub enum QueryAction {
    /// List connected peers
    Peers,

    /// Show orders
    Orders,

    /// Show proposals for an order
    Negotiations { order_id: String },
}
