// cli/src/main.rs
use anyhow::Context;
use chain_core::{units, U256};
use clap::{Parser, Subcommand};
use deploy::{
    interact, tasks, verify, DeploymentStore, Environment, ProjectConfig, Runtime, VerifyOutcome,
};
use smart_contracts::contracts::fund_me;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wallet::{Button, NodeWallet, WalletClient};

#[derive(Parser)]
#[command(name = "dapp-lab")]
#[command(about = "Deploy, test and drive the example contracts", version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Network to run against
    #[arg(short, long, global = true)]
    network: Option<String>,

    /// Project configuration file (defaults to ./dapp-lab.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve a development chain over JSON-RPC as the `localhost` network
    Node {
        #[arg(short, long, default_value = "8545")]
        port: u16,

        /// Deploy scripts to run before serving
        #[arg(short, long, value_delimiter = ',', default_value = "all")]
        tags: Vec<String>,
    },

    /// Run the deploy scripts matching the tags
    Deploy {
        #[arg(short, long, value_delimiter = ',', default_value = "all")]
        tags: Vec<String>,
    },

    /// Fund the FundMe contract as the deployer
    Fund {
        /// Amount in ether
        #[arg(short, long)]
        amount: Option<String>,
    },

    /// Withdraw everything from FundMe as its owner
    Withdraw,

    /// Store a number in EventsExample
    StoreNumber {
        #[arg(default_value_t = interact::DEFAULT_STORED_NUMBER)]
        number: u64,
    },

    /// Enter the lottery paying the entrance fee
    EnterLottery,

    /// Print the current block number
    BlockNumber,

    /// Print the available accounts
    Accounts,

    /// Encrypt PRIVATE_KEY into a keystore file
    EncryptKey {
        /// Directory to write the keystore into
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },

    /// Verify a deployed contract on the block explorer
    Verify {
        #[arg(long)]
        contract: String,
    },

    /// Run the interaction scripts on a fresh chain and print gas usage
    GasReport,

    /// Drive FundMe through a wallet, as a front-end would
    Wallet {
        #[command(subcommand)]
        command: WalletCommands,
    },
}

#[derive(Subcommand)]
enum WalletCommands {
    /// Request account access
    Connect,

    /// Fund with an amount in ether
    Fund {
        #[arg(default_value = "0.1")]
        amount: String,
    },

    /// Withdraw as the connected account
    Withdraw,

    /// Print the contract balance
    Balance,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "{}={level},deploy={level},wallet={level},rpc={level},devnet={level},hyper=warn,h2=warn",
                    env!("CARGO_PKG_NAME"),
                    level = log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let environment = Environment::load();
    let config = ProjectConfig::load(cli.config.as_deref())?;
    let network = cli
        .network
        .clone()
        .unwrap_or_else(|| config.default_network.clone());

    match cli.command {
        Commands::Node { port, tags } => {
            run_node(config, environment, port, &tags).await?;
        }
        Commands::Deploy { tags } => {
            let runtime = Runtime::connect(config, environment, &network).await?;
            let tags: Vec<&str> = tags.iter().map(String::as_str).collect();
            let ran = runtime.deploy_tags(&tags).await?;
            tracing::info!("✓ Ran {} deploy script(s) on {}", ran.len(), network);
            report_gas(&runtime).await?;
        }
        Commands::Fund { amount } => {
            let runtime = interaction_runtime(config, environment, &network).await?;
            let amount = match amount {
                Some(amount) => units::parse_ether(&amount)?,
                None => interact::default_fund_amount(),
            };
            interact::fund(&runtime, amount).await?;
        }
        Commands::Withdraw => {
            let runtime = interaction_runtime(config, environment, &network).await?;
            interact::withdraw(&runtime).await?;
        }
        Commands::StoreNumber { number } => {
            let runtime = interaction_runtime(config, environment, &network).await?;
            interact::store_number(&runtime, U256::from(number)).await?;
        }
        Commands::EnterLottery => {
            let runtime = interaction_runtime(config, environment, &network).await?;
            interact::enter_lottery(&runtime).await?;
        }
        Commands::BlockNumber => {
            let runtime = Runtime::connect(config, environment, &network).await?;
            tasks::block_number(&runtime).await?;
        }
        Commands::Accounts => {
            let runtime = Runtime::connect(config, environment, &network).await?;
            tasks::accounts(&runtime).await?;
        }
        Commands::EncryptKey { dir } => {
            let encrypted = tasks::encrypt_key(&environment, &dir)?;
            tracing::info!("✓ Keystore written to {}", encrypted.path.display());
        }
        Commands::Verify { contract } => {
            let runtime = Runtime::connect(config, environment, &network).await?;
            let record = runtime.deployments().require(&contract).await?;
            match verify::verify(&runtime, &record).await {
                VerifyOutcome::Skipped => {
                    tracing::info!("Verification skipped on {}", network);
                }
                VerifyOutcome::Failed(e) => {
                    tracing::warn!("Verification of {} failed: {}", contract, e);
                }
                VerifyOutcome::Verified | VerifyOutcome::AlreadyVerified => {}
            }
        }
        Commands::GasReport => {
            run_gas_report(config, environment).await?;
        }
        Commands::Wallet { command } => {
            let runtime = interaction_runtime(config, environment, &network).await?;
            run_wallet(&runtime, command).await?;
        }
    }

    Ok(())
}

/// Runtime for an interaction script. The in-process chain starts empty,
/// so it gets every contract deployed first.
async fn interaction_runtime(
    config: ProjectConfig,
    environment: Environment,
    network: &str,
) -> anyhow::Result<Runtime> {
    let runtime = Runtime::connect(config, environment, network).await?;
    if runtime.devnet().is_some() {
        runtime.fixture(&["all"]).await?;
    }
    Ok(runtime)
}

async fn run_node(
    config: ProjectConfig,
    environment: Environment,
    port: u16,
    tags: &[String],
) -> anyhow::Result<()> {
    let deployments_dir = config.deployments_dir.clone();
    let runtime = Runtime::connect(config, environment, "hardhat").await?;
    let devnet = runtime
        .devnet()
        .cloned()
        .context("the hardhat network is configured with a URL; nothing to serve")?;

    let tags: Vec<&str> = tags.iter().map(String::as_str).collect();
    runtime.deploy_tags(&tags).await?;

    // Publish the records so `--network localhost` resolves them
    let store = DeploymentStore::open(&deployments_dir, "localhost")?;
    store.clear().await?;
    for record in runtime.deployments().all().await {
        tracing::info!("✓ {} at {:?}", record.contract_name, record.address);
        store.save(record).await?;
    }

    let rpc_config = rpc::RpcConfig {
        listen_addr: SocketAddr::from(([127, 0, 0, 1], port)),
        ..Default::default()
    };
    let server = Arc::new(rpc::RpcServer::new(rpc_config, rpc::RpcMethods::new(devnet)));
    let (addr, handle) = server.spawn()?;
    tracing::info!("✓ JSON-RPC server started on http://{}", addr);
    for account in runtime.accounts().await? {
        tracing::info!("Account {:?}", account);
    }

    tokio::select! {
        result = handle => {
            result??;
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("Received shutdown signal");
        }
    }
    Ok(())
}

async fn run_gas_report(config: ProjectConfig, environment: Environment) -> anyhow::Result<()> {
    let runtime = interaction_runtime(config, environment, "hardhat").await?;
    interact::fund(&runtime, interact::default_fund_amount()).await?;
    interact::withdraw(&runtime).await?;
    interact::store_number(&runtime, U256::from(interact::DEFAULT_STORED_NUMBER)).await?;
    interact::enter_lottery(&runtime).await?;

    let output = runtime.gas_reporter().settings().output_file.clone();
    let report = runtime
        .gas_reporter()
        .priced_report(runtime.environment().coinmarketcap_api_key())
        .await;
    let rendered = report.render();
    match output {
        Some(path) => {
            std::fs::write(&path, &rendered)
                .with_context(|| format!("writing gas report to {}", path.display()))?;
            tracing::info!("✓ Gas report written to {}", path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

/// Print the gas report after a run when it is enabled in the config
async fn report_gas(runtime: &Runtime) -> anyhow::Result<()> {
    let reporter = runtime.gas_reporter();
    if !reporter.settings().enabled {
        return Ok(());
    }
    let report = reporter
        .priced_report(runtime.environment().coinmarketcap_api_key())
        .await;
    if !report.is_empty() {
        println!("{}", report.render());
    }
    Ok(())
}

async fn run_wallet(runtime: &Runtime, command: WalletCommands) -> anyhow::Result<()> {
    let fund_me = runtime.deployments().require(fund_me::NAME).await?;
    let injected = Arc::new(NodeWallet::new(runtime.provider()));
    let mut client = WalletClient::new(Some(injected), fund_me.address);

    client.click(Button::Connect).await;
    match command {
        WalletCommands::Connect => {
            tracing::info!("{}", client.status().label());
        }
        WalletCommands::Fund { amount } => client.click(Button::Fund(amount)).await,
        WalletCommands::Withdraw => client.click(Button::Withdraw).await,
        WalletCommands::Balance => client.click(Button::Balance).await,
    }
    Ok(())
}
