//! # Hedron CLI
//!
//! Runs single requests against a network described by a JSON client
//! configuration. Results are printed to stdout as JSON; logs go to stderr.
//!
//! ## Usage
//!
//! ```bash
//! # Free balance lookup
//! hedron -c network.json balance 0.0.1001
//!
//! # Paid account info, refusing to pay more than 100 tinyunits
//! hedron -c network.json info 0.0.1001 --max-payment 100
//!
//! # Transfer from the operator and wait for consensus
//! hedron -c network.json transfer 0.0.1002 250
//!
//! # Look up a receipt
//! hedron -c network.json receipt 0.0.1001@1700000000.000000000
//!
//! # Print the network address book, optionally adopting it
//! hedron -c network.json nodes --apply
//! ```

use anyhow::{Context, Result};
use argh::FromArgs;
use hedron_client::{
    AccountBalanceQuery, AccountInfoQuery, AddressBookQuery, Client, ClientConfig, TransactionReceiptQuery,
    TransferTransaction,
};
use hedron_common::{AccountId, Amount, TransactionId};
use serde::Serialize;

#[derive(FromArgs)]
/// execute requests against a permissioned Hedron node network
struct Cli {
    /// path to the JSON client configuration
    #[argh(option, short = 'c', default = "\"hedron.json\".into()")]
    config: String,

    /// maximum attempts per request, overriding the configuration
    #[argh(option, long = "max-attempts")]
    max_attempts: Option<usize>,

    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Balance(BalanceArgs),
    Info(InfoArgs),
    Transfer(TransferArgs),
    Receipt(ReceiptArgs),
    Nodes(NodesArgs),
    Metrics(MetricsArgs),
}

#[derive(FromArgs)]
#[argh(subcommand, name = "balance")]
/// query an account balance (free)
struct BalanceArgs {
    /// account to look up, `shard.realm.num`
    #[argh(positional)]
    account: AccountId,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "info")]
/// query account details (paid by the operator)
struct InfoArgs {
    /// account to look up, `shard.realm.num`
    #[argh(positional)]
    account: AccountId,

    /// refuse to pay more than this many tinyunits
    #[argh(option, long = "max-payment")]
    max_payment: Option<i64>,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "transfer")]
/// transfer tinyunits from the operator account
struct TransferArgs {
    /// receiving account, `shard.realm.num`
    #[argh(positional)]
    to: AccountId,

    /// amount in tinyunits
    #[argh(positional)]
    amount: i64,

    /// optional memo attached to the transaction
    #[argh(option, long = "memo")]
    memo: Option<String>,

    /// return after submission instead of waiting for the receipt
    #[argh(switch, long = "no-wait")]
    no_wait: bool,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "receipt")]
/// look up the receipt of a transaction
struct ReceiptArgs {
    /// transaction id, `shard.realm.num@seconds.nanos`
    #[argh(positional)]
    transaction_id: TransactionId,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "nodes")]
/// print the network address book
struct NodesArgs {
    /// replace the configured node list with the fetched one
    #[argh(switch, long = "apply")]
    apply: bool,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "metrics")]
/// run a balance query and print the execution metrics it produced
struct MetricsArgs {
    /// account to look up, `shard.realm.num`
    #[argh(positional)]
    account: AccountId,
}

#[derive(Serialize)]
struct TransferOutput {
    transaction_id: String,
    node_account_id: AccountId,
    #[serde(skip_serializing_if = "Option::is_none")]
    receipt: Option<hedron_client::TransactionReceipt>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = ClientConfig::from_file(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config))?;
    if cli.max_attempts.is_some() {
        config.max_attempts = cli.max_attempts;
    }
    // No background refresh for one-shot commands.
    config.address_book_refresh_secs = None;

    let client = Client::from_config(&config)?;
    tracing::debug!(config = %cli.config, nodes = client.pool().len(), "client ready");

    let result = run(&client, cli.command).await;
    client.stop_address_book_refresh().await;
    result
}

async fn run(client: &Client, command: Commands) -> Result<()> {
    match command {
        Commands::Balance(args) => {
            let balance = AccountBalanceQuery::new()
                .account_id(args.account)
                .execute(client)
                .await?;
            print_json(&balance)
        }
        Commands::Info(args) => {
            let mut query = AccountInfoQuery::new();
            query.account_id(args.account);
            if let Some(max) = args.max_payment {
                query.max_query_payment(Amount::from_tinyunits(max));
            }
            let info = query.execute(client).await?;
            print_json(&info)
        }
        Commands::Transfer(args) => run_transfer(client, args).await,
        Commands::Receipt(args) => {
            let receipt = TransactionReceiptQuery::new()
                .transaction_id(args.transaction_id)
                .execute(client)
                .await?;
            print_json(&receipt)
        }
        Commands::Nodes(args) => {
            let book = AddressBookQuery::new().execute(client).await?;
            if args.apply {
                client.pool().replace_membership(book.entries());
                tracing::info!(nodes = client.pool().len(), "adopted network address book");
            }
            print_json(&book)
        }
        Commands::Metrics(args) => {
            let outcome = AccountBalanceQuery::new()
                .account_id(args.account)
                .execute(client)
                .await;
            if let Err(e) = &outcome {
                tracing::warn!(error = %e, "balance query failed");
            }
            print_json(&client.metrics_snapshot())
        }
    }
}

async fn run_transfer(client: &Client, args: TransferArgs) -> Result<()> {
    let from = client
        .operator_account_id()
        .context("transfer needs an operator in the configuration")?;

    let mut tx = TransferTransaction::new();
    tx.transfer(from, Amount::from_tinyunits(-args.amount))
        .transfer(args.to, Amount::from_tinyunits(args.amount));
    if let Some(memo) = args.memo {
        tx.transaction_memo(memo);
    }

    let response = tx.execute(client).await?;
    tracing::info!(transaction_id = %response.transaction_id, node = %response.node_account_id, "transfer submitted");

    let receipt = if args.no_wait {
        None
    } else {
        Some(response.get_receipt(client).await?)
    };

    print_json(&TransferOutput {
        transaction_id: response.transaction_id.to_string(),
        node_account_id: response.node_account_id,
        receipt,
    })
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
