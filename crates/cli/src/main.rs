//! Bento CLI - order food, and run the store order board, from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Browse as a guest and fill a cart
//! bento store select 1
//! bento cart add 10 --qty 2
//!
//! # Sign in (the guest cart moves into the account)
//! BENTO_PASSWORD=... bento login customer1
//! bento checkout
//!
//! # Store staff: watch for new orders
//! bento login store1
//! bento orders watch
//! bento orders set-status 42 ready
//! ```
//!
//! # Environment Variables
//!
//! - `BENTO_API_BASE_URL` - Backend root, including `/api`
//! - `BENTO_PROFILE_DIR` - Where the session file lives (default `.bento`)
//! - `BENTO_LOG_JSON` - Emit logs as JSON
//! - `RUST_LOG` - Log filter (default `bento_client=info,bento_cli=info`)

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "bento")]
#[command(author, version, about = "Bento ordering client")]
struct Cli {
    /// Answer yes to every confirmation
    #[arg(short, long, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in. The password is read from `BENTO_PASSWORD` or standard input
    Login {
        username: String,

        /// Page to continue to after signing in
        #[arg(long)]
        redirect: Option<String>,
    },
    /// Sign out
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Choose the store to order from
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Place an order for everything in the cart
    Checkout,
    /// Store order board
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
    /// Your past orders
    History,
    /// Cancel one of your pending orders
    Cancel { order_id: i64 },
    /// New-order sound preference
    Sound {
        #[arg(value_enum, default_value = "show")]
        setting: commands::orders::SoundSetting,
    },
}

#[derive(Subcommand)]
enum StoreAction {
    /// Remember the store and start a guest session if needed
    Select { store_id: i64 },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart
    Show,
    /// Add a menu item
    Add {
        menu_id: i64,

        /// Store the menu belongs to (default: the selected store)
        #[arg(long)]
        store: Option<i64>,

        #[arg(short, long, default_value_t = 1)]
        qty: u32,
    },
    /// Set a line's quantity; 0 removes it
    Set {
        item_id: i64,
        #[arg(allow_negative_numbers = true)]
        qty: i64,
    },
    /// Remove a line
    Remove { item_id: i64 },
    /// Remove everything
    Clear,
}

#[derive(Subcommand)]
enum OrdersAction {
    /// List orders once
    List(commands::orders::FilterArgs),
    /// Keep the board open and alert on new orders
    Watch {
        #[command(flatten)]
        filters: commands::orders::FilterArgs,

        /// Seconds between refreshes (default: `BENTO_POLL_INTERVAL_SECS`)
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Move an order to a new status
    SetStatus { order_id: i64, status: String },
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!(error = %e, "Command failed");
        output::failure(&e.to_string());
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("bento_client=info,bento_cli=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if std::env::var_os("BENTO_LOG_JSON").is_some() {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = commands::Context::from_env(cli.yes)?;
    match cli.command {
        Commands::Login { username, redirect } => {
            commands::session::login(&ctx, &username, redirect.as_deref()).await?;
        }
        Commands::Logout => commands::session::logout(&ctx)?,
        Commands::Whoami => commands::session::whoami(&ctx).await?,
        Commands::Store { action } => match action {
            StoreAction::Select { store_id } => commands::session::select_store(&ctx, store_id).await?,
        },
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(&ctx).await?,
            CartAction::Add { menu_id, store, qty } => {
                commands::cart::add(&ctx, menu_id, store, qty).await?;
            }
            CartAction::Set { item_id, qty } => commands::cart::set(&ctx, item_id, qty).await?,
            CartAction::Remove { item_id } => commands::cart::remove(&ctx, item_id).await?,
            CartAction::Clear => commands::cart::clear(&ctx).await?,
        },
        Commands::Checkout => commands::cart::checkout(&ctx).await?,
        Commands::Orders { action } => match action {
            OrdersAction::List(filters) => commands::orders::list(&ctx, &filters).await?,
            OrdersAction::Watch { filters, interval } => {
                commands::orders::watch(&ctx, &filters, interval).await?;
            }
            OrdersAction::SetStatus { order_id, status } => {
                commands::orders::set_status(&ctx, order_id, &status).await?;
            }
        },
        Commands::History => commands::orders::history(&ctx).await?,
        Commands::Cancel { order_id } => commands::orders::cancel(&ctx, order_id).await?,
        Commands::Sound { setting } => commands::orders::sound(&ctx, setting),
    }
    Ok(())
}
