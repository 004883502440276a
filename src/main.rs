//! BlackTrace CLI binary: parses arguments, loads config, and either
//! starts a node or sends a one-shot command to a running node's command
//! channel via [`NodeClient`].

use blacktrace::chain::{ChainConnector, ContractConnector, ZcashConnector};
use blacktrace::cli::{Cli, Commands, IdentityAction, NegotiateAction, NodeClient, OrderAction, QueryAction, SettlementAction};
use blacktrace::config::NodeConfig;
use blacktrace::controller::Node;
use blacktrace::types::{now_ms, ZcashNetwork};
use clap::Parser;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = NodeConfig::load_or_default(&cli.config)?;
    config.validate()?;

    let node_fingerprint = format!("node_{}", now_ms());

    let zcash_network = match config.chain.zcash_network.as_str() {
        "mainnet" => ZcashNetwork::Mainnet,
        _ => ZcashNetwork::Testnet,
    };
    let source_chain: Arc<dyn ChainConnector> = Arc::new(ZcashConnector::new(
        config.chain.zcash_rpc_url.clone(),
        config.chain.zcash_rpc_user.clone(),
        config.chain.zcash_rpc_password.clone(),
        zcash_network,
    ));
    let dest_chain: Arc<dyn ChainConnector> = Arc::new(ContractConnector::new(config.chain.dest_rpc_url.clone()));

    // Every invocation builds its own `Node` — identity and settlement
    // state are sled/disk-backed and so survive across invocations, but
    // the order book and negotiation engine are in-memory only, so
    // non-`node` subcommands only see state created by an earlier command
    // in the same process. A real deployment would run `blacktrace node`
    // as a daemon and have these subcommands reach it over a local socket;
    // that transport and the exact adapter wiring are left to the deployer.
    let (node, command_tx) = Node::new(config, node_fingerprint, source_chain, dest_chain).await?;
    let client = NodeClient::new(command_tx, node.identity(), node.settlement());

    match cli.command {
        Commands::Node { connect } => {
            if let Some(addr) = connect {
                let multiaddr: libp2p::Multiaddr = addr.parse()?;
                client.dial(multiaddr).await?;
            }

            tracing::info!("node running; press ctrl-c to stop");
            let cancel = node.cancellation_token();
            let run_handle = tokio::spawn(async move { node.run().await });

            tokio::signal::ctrl_c().await?;
            cancel.cancel();
            run_handle.await?;
        }

        Commands::Identity { action } => match action {
            IdentityAction::Register { username, password } => {
                client.register(&username, &password)?;
                println!("registered {username}");
            }
            IdentityAction::Login { username, password } => {
                let session_id = client.login(&username, &password)?;
                println!("{session_id}");
            }
            IdentityAction::Whoami { session_id } => {
                println!("{}", client.whoami(&session_id)?);
            }
            IdentityAction::Logout { session_id } => {
                client.logout(&session_id)?;
                println!("logged out");
            }
        },

        Commands::Order { action } => match action {
            OrderAction::Create { maker_user, source_asset, dest_asset, amount, min_price, max_price, target_user } => {
                let order_id = client
                    .create_order(maker_user, source_asset, &dest_asset, amount, min_price, max_price, target_user)
                    .await?;
                println!("{order_id}");
            }
            OrderAction::List => {
                for order in client.list_orders().await? {
                    println!("{} {} {}/{} state={:?}", order.order_id, order.source_asset, order.min_price, order.max_price, order.state);
                }
            }
        },

        Commands::Negotiate { action } => match action {
            NegotiateAction::Propose { order_id, proposer_user, price, amount } => {
                let proposal = client.propose(order_id, proposer_user, price, amount).await?;
                println!("{}", proposal.proposal_id);
            }
            NegotiateAction::Accept { order_id, proposal_id, session_id } => {
                client.accept(order_id, proposal_id, session_id).await?;
                println!("accepted");
            }
            NegotiateAction::Reject { order_id, proposal_id } => {
                client.reject(order_id, proposal_id).await?;
                println!("rejected");
            }
        },

        Commands::Settlement { action } => match action {
            SettlementAction::Status { proposal_id } => match client.settlement_status(&proposal_id) {
                Some(status) => println!("{status}"),
                None => println!("no settlement record for proposal {proposal_id}"),
            },
        },

        Commands::Query { action } => match action {
            QueryAction::Peers => {
                tracing::info!("peer listing requires a running node; see the node's own logs");
            }
            QueryAction::Orders => {
                for order in client.list_orders().await? {
                    println!("{} state={:?}", order.order_id, order.state);
                }
            }
            QueryAction::Negotiations { order_id: _ } => {
                tracing::info!("per-order negotiation listing requires a running node command extension");
            }
        },
    }

    Ok(())
}
