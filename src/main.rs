//! IronPocket 命令行入口
//! 开发用驱动：每条命令都是一次完整会话（加载配置 → 初始化 → 执行）

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ironpocket::{
    config::Config,
    domain::{Direction, KeySource, TxProgress, TxStatus},
    infrastructure::logging,
    service::{
        BiometricGate, ConsolePromptGate, FileSecureStore, GasEstimateDebouncer,
        JsonRpcChainGateway, NoBiometricHardware, Secp256k1KeyProvider,
    },
    utils::format_timestamp,
    WalletError, WalletErrorCode, WalletManager, WalletManagerOptions,
};

#[derive(Debug, Parser)]
#[command(name = "ironpocket", version, about = "Single-wallet EVM key lifecycle driver")]
struct Cli {
    /// TOML config file layered over environment defaults
    #[arg(long, value_name = "PATH", env = "IRONPOCKET_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load the wallet from secure storage
    Init,
    /// Create a new random wallet (replaces any existing one)
    Create,
    /// Restore from a private key
    RestoreKey {
        #[arg(value_name = "HEX")]
        key: String,
    },
    /// Restore from a BIP-39 recovery phrase
    RestoreMnemonic {
        #[arg(value_name = "WORD", required = true, num_args = 1..)]
        words: Vec<String>,
    },
    /// Print the active address
    Address,
    /// Query the balance
    Balance,
    /// Show the latest transactions
    History {
        /// Defaults to the active wallet
        address: Option<String>,
    },
    /// Estimate gas for a transfer without signing
    Estimate { to: String, amount: String },
    /// Send native currency.
    ///
    /// Prompts for confirmation unless unlocking the secure store already
    /// authenticated this session.
    Send { to: String, amount: String },
    /// Reveal the private key (always asks for confirmation)
    Export,
    /// Show whether a transaction is unknown, pending or mined
    Status {
        #[arg(value_name = "TX_HASH")]
        tx_hash: String,
    },
    /// Remove the wallet from this device
    Delete,
}

impl Command {
    /// 存储中的密钥损坏时仍允许执行（覆盖或删除）
    fn tolerates_corrupt_secret(&self) -> bool {
        matches!(
            self,
            Self::Create | Self::RestoreKey { .. } | Self::RestoreMnemonic { .. } | Self::Delete
        )
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Create => "create",
            Self::RestoreKey { .. } => "restore-key",
            Self::RestoreMnemonic { .. } => "restore-mnemonic",
            Self::Address => "address",
            Self::Balance => "balance",
            Self::History { .. } => "history",
            Self::Estimate { .. } => "estimate",
            Self::Send { .. } => "send",
            Self::Export => "export",
            Self::Status { .. } => "status",
            Self::Delete => "delete",
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // 加载 .env（需在解析参数之前，env 默认值才能生效）
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<WalletError>() {
                Some(wallet_err) => {
                    tracing::debug!(code = %wallet_err.code, "command failed");
                    eprintln!("error: {}", wallet_err.user_message());
                }
                None => eprintln!("error: {:#}", e),
            }
            ExitCode::from(1)
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let config = Config::from_env_and_file(path)?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn build_manager(config: &Config) -> Result<Arc<WalletManager>> {
    let gate: Arc<dyn BiometricGate> = if config.security.biometric_enabled {
        Arc::new(ConsolePromptGate)
    } else {
        Arc::new(NoBiometricHardware)
    };

    let store = FileSecureStore::new(config.storage.dir.clone(), config.store_passphrase()?)
        .with_gate(gate.clone());
    let gateway = JsonRpcChainGateway::new(&config.gateway)?;

    Ok(Arc::new(WalletManager::new(
        Arc::new(Secp256k1KeyProvider::new()),
        Arc::new(store),
        gate,
        Arc::new(gateway),
        WalletManagerOptions::from(config),
    )))
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_ref())?;
    if let Err(e) = logging::init_logging(&config.logging) {
        eprintln!("Failed to initialize logging: {:#}", e);
    }
    tracing::info!(
        command = cli.command.name(),
        chain_id = config.gateway.chain_id,
        "ironpocket starting"
    );

    let manager = build_manager(&config)?;
    let loaded = match manager.initialize().await {
        Ok(loaded) => loaded,
        Err(e)
            if e.code == WalletErrorCode::CorruptSecret
                && cli.command.tolerates_corrupt_secret() =>
        {
            eprintln!("warning: {}", e.user_message());
            None
        }
        Err(e) => return Err(e.into()),
    };

    match cli.command {
        Command::Init => match loaded {
            Some(summary) => {
                println!("address: {}", summary.address);
                if let Some(balance) = summary.balance {
                    println!("balance: {} ETH", balance);
                }
            }
            None => println!("no wallet on this device"),
        },
        Command::Create => {
            let summary = manager.create_wallet(KeySource::Random).await?;
            println!("created: {}", summary.address);
        }
        Command::RestoreKey { key } => {
            let summary = manager.restore_wallet(KeySource::PrivateKey(key)).await?;
            println!("restored: {}", summary.address);
        }
        Command::RestoreMnemonic { words } => {
            let summary = manager
                .restore_wallet(KeySource::Mnemonic(words.join(" ")))
                .await?;
            println!("restored: {}", summary.address);
        }
        Command::Address => {
            let address = manager.address().await.ok_or_else(WalletError::wallet_not_loaded)?;
            println!("{}", address);
        }
        Command::Balance => {
            let balance = manager.get_balance().await?;
            println!("{} ETH", balance);
        }
        Command::History { address } => {
            let address = match address {
                Some(address) => address,
                None => manager.address().await.ok_or_else(WalletError::wallet_not_loaded)?,
            };
            let page = manager.get_transaction_history(&address).await?;
            if page.records.is_empty() {
                println!("no transactions");
            }
            for record in &page.records {
                let (arrow, counterparty) = match record.direction {
                    Direction::Sent => (
                        "OUT",
                        record.to.as_deref().unwrap_or("(contract creation)"),
                    ),
                    Direction::Received => ("IN ", record.from.as_str()),
                };
                let status = match record.status {
                    TxStatus::Success => "",
                    TxStatus::Failed => " [failed]",
                };
                println!(
                    "{} {} {} ETH {} {}{}",
                    format_timestamp(&record.timestamp),
                    arrow,
                    record.value,
                    counterparty,
                    record.hash,
                    status
                );
            }
            if let Some(token) = page.next_page_token {
                println!("more available (page key {})", token);
            }
        }
        Command::Estimate { to, amount } => {
            let debouncer = GasEstimateDebouncer::from_config(manager.clone(), &config.send);
            let pending = debouncer
                .submit(&to, &amount)
                .await
                .context("gas estimate was superseded")??;
            println!(
                "sending {} ETH to {} needs about {} gas",
                pending.amount, pending.recipient, pending.estimated_gas
            );
        }
        Command::Send { to, amount } => {
            if !manager.is_authenticated() {
                manager.authenticate().await?;
            }
            let receipt = manager.send_transaction(&to, &amount).await?;
            println!("sent {} ETH to {}", receipt.amount, receipt.recipient);
            println!("tx hash: {}", receipt.tx_hash);
        }
        Command::Export => {
            let key = manager.export_private_key().await?;
            println!("{}", key.as_str());
        }
        Command::Status { tx_hash } => match manager.transaction_status(&tx_hash).await? {
            TxProgress::Mined(TxStatus::Success) => println!("confirmed"),
            TxProgress::Mined(TxStatus::Failed) => println!("failed"),
            TxProgress::Pending => println!("pending"),
            TxProgress::Unknown => println!("unknown to the node"),
        },
        Command::Delete => {
            manager.delete_wallet().await?;
            println!("wallet removed");
        }
    }

    Ok(())
}
