use accountdeck::api::AccountApi;
use accountdeck::bootstrap::{Bootstrap, ScreenGeometry};
use accountdeck::config::AppConfig;
use accountdeck::models::Account;
use accountdeck::{commands, logging, AppState};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "accountdeck", version, about = "Account list console and headless display launcher")]
struct Cli {
    /// Config file (default: <config dir>/accountdeck/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print JSON instead of a table
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage accounts on the account API
    #[command(subcommand)]
    Accounts(AccountsCommand),

    /// Read or change stored settings
    #[command(subcommand)]
    Settings(SettingsCommand),

    /// Show operation counters
    Stats,

    /// Start a virtual display and exec a program on it
    Launch {
        /// Display number
        #[arg(long)]
        display: Option<u32>,

        /// Screen geometry, WIDTHxHEIGHTxDEPTH
        #[arg(long)]
        geometry: Option<ScreenGeometry>,

        /// Display server binary
        #[arg(long)]
        server: Option<String>,

        /// Program and its arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        program: Vec<String>,
    },
}

#[derive(Subcommand)]
enum AccountsCommand {
    List,
    Delete { id: String },
    Enable { id: String },
    Disable { id: String },
    BulkEnable {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    BulkDisable {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    BulkDelete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Replace the account configuration from a JSON file and reload
    UpdateConfig { file: PathBuf },
    /// Last saved snapshot, no network
    Cached,
}

#[derive(Subcommand)]
enum SettingsCommand {
    Show,
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // logging (console + daily file)
    let guard = logging::init(&AppConfig::log_dir());
    tracing::debug!(
        "accountdeck starting... Log file: {:?}",
        AppConfig::log_dir().join(logging::LOG_FILE)
    );

    // run the command, errors become exit code 1
    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            1
        }
    };

    // flush the file writer before exiting
    drop(guard);
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    // config file, then env overrides
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Launch {
            display,
            geometry,
            server,
            program,
        } => {
            // command line beats the config file
            let mut display_config = config.display.clone();
            if let Some(number) = display {
                display_config.number = number;
            }
            if let Some(geometry) = geometry {
                display_config.geometry = geometry;
            }
            if let Some(server) = server {
                display_config.server = server;
            }

            let (program, args) = program
                .split_first()
                .ok_or_else(|| anyhow::anyhow!("no program given"))?;
            let code = Bootstrap::new(display_config).run(program, args).await?;
            Ok(code)
        }
        Command::Accounts(command) => {
            let state = AppState::init(&config).await?;
            run_accounts(&state, command, cli.json).await?;
            Ok(0)
        }
        Command::Settings(command) => {
            let state = AppState::init(&config).await?;
            match command {
                SettingsCommand::Show => {
                    let settings = commands::get_settings(&state).await?;
                    println!("{}", serde_json::to_string_pretty(&settings)?);
                }
                SettingsCommand::Set { key, value } => {
                    commands::set_setting(&state, &key, &value).await?;
                }
            }
            Ok(0)
        }
        Command::Stats => {
            let state = AppState::init(&config).await?;
            let stats = commands::get_stats(&state).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(0)
        }
    }
}

async fn run_accounts<A: AccountApi>(state: &AppState<A>, command: AccountsCommand, json: bool) -> Result<()> {
    let accounts = match command {
        AccountsCommand::List => commands::get_accounts(state).await?,
        AccountsCommand::Delete { id } => commands::delete_account(state, &id).await?,
        AccountsCommand::Enable { id } => commands::enable_account(state, &id).await?,
        AccountsCommand::Disable { id } => commands::disable_account(state, &id).await?,
        AccountsCommand::BulkEnable { ids } => commands::bulk_enable(state, &ids).await?,
        AccountsCommand::BulkDisable { ids } => commands::bulk_disable(state, &ids).await?,
        AccountsCommand::BulkDelete { ids } => {
            let (report, accounts) = commands::bulk_delete(state, &ids).await?;
            if !report.failed.is_empty() {
                eprintln!(
                    "{} of {} deletes failed: {}",
                    report.failed.len(),
                    report.requested,
                    report.failed.join(", ")
                );
            }
            accounts
        }
        AccountsCommand::UpdateConfig { file } => commands::update_config(state, &file).await?,
        AccountsCommand::Cached => commands::get_cached_accounts(state).await?,
    };

    print_accounts(&accounts, json)
}

fn print_accounts(accounts: &[Account], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(accounts)?);
        return Ok(());
    }

    let width = accounts.iter().map(|a| a.id.len()).max().unwrap_or(2).max(2);
    println!("{:<width$}  {:<8}  {:>8}  REASON", "ID", "STATUS", "COOLDOWN", width = width);
    for account in accounts {
        let status = if account.disabled { "disabled" } else { "enabled" };
        let cooldown = if account.is_cooling_down() {
            format!("{}s", account.cooldown_seconds)
        } else {
            "-".to_string()
        };
        println!(
            "{:<width$}  {:<8}  {:>8}  {}",
            account.id,
            status,
            cooldown,
            account.cooldown_reason,
            width = width
        );
    }
    println!("{} accounts", accounts.len());

    Ok(())
}
