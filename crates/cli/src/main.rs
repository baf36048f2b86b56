//! Marigold CLI - cart, checkout and order history from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (identity is kept in the session file)
//! mg login --user-id 7 --email lan@shop.vn
//!
//! # Show the cart and change a quantity
//! mg cart show
//! mg cart qty 12 -- -1
//!
//! # Check out every line in the cart
//! mg checkout place --first-name Lan ... --payment cod --accept-terms
//!
//! # Retry a cart clear left over from an earlier checkout
//! mg checkout resume
//! ```
//!
//! # Commands
//!
//! - `login` / `logout` / `whoami` - Session identity
//! - `cart` - Show, add, change quantity, remove, clear
//! - `checkout` - Place an order from the cart, or resume a pending clear
//! - `orders` - Latest order, status listings, order detail
//! - `wishlist` - List, add, remove

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Args, Parser, Subcommand};
use marigold_core::{CartItemId, OrderId, OrderStatus, ProductId, UserId};
use marigold_storefront::checkout::{PaymentMethod, ShippingMethod};
use marigold_storefront::config::ClientConfig;
use marigold_storefront::{Storefront, StorefrontError};

mod commands;
mod prompt;
mod telemetry;

#[derive(Parser)]
#[command(name = "mg")]
#[command(author, version, about = "Marigold storefront CLI")]
struct Cli {
    /// Answer yes to every confirmation prompt
    #[arg(short, long, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record the signed-in user
    Login {
        #[arg(long)]
        user_id: UserId,

        #[arg(long)]
        email: String,

        /// Bearer token for authenticated requests
        #[arg(long)]
        token: Option<String>,
    },
    /// Forget the signed-in user
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Check out
    Checkout {
        #[command(subcommand)]
        action: CheckoutAction,
    },
    /// Order history
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
    /// Manage the wishlist
    Wishlist {
        #[command(subcommand)]
        action: WishlistAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// List cart lines and the subtotal
    Show,
    /// Add a product
    Add {
        product_id: ProductId,

        #[arg(short, long, default_value_t = 1)]
        quantity: i64,

        #[arg(long)]
        color: Option<String>,

        #[arg(long)]
        size: Option<String>,
    },
    /// Change a line's quantity by a (possibly negative) delta
    Qty {
        item: CartItemId,

        #[arg(allow_negative_numbers = true)]
        delta: i64,
    },
    /// Remove a line
    Rm { item: CartItemId },
    /// Remove every line
    Clear,
}

#[derive(Subcommand)]
enum CheckoutAction {
    /// Create an order from the cart and confirm it
    Place(PlaceArgs),
    /// Retry clearing the cart of an already placed order
    Resume,
}

#[derive(Args)]
struct PlaceArgs {
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    #[arg(long)]
    country: String,
    #[arg(long)]
    street: String,
    #[arg(long)]
    city: String,
    #[arg(long)]
    state: Option<String>,
    #[arg(long)]
    zip: String,
    #[arg(long)]
    phone: String,

    /// free, normal or fast
    #[arg(long, default_value = "free")]
    shipping: ShippingMethod,

    /// cod, card or bank
    #[arg(long)]
    payment: PaymentMethod,

    /// Required; the order is not created without it
    #[arg(long)]
    accept_terms: bool,

    /// Cart lines to order (default: every line)
    #[arg(long, value_delimiter = ',')]
    items: Vec<CartItemId>,
}

#[derive(Subcommand)]
enum OrdersAction {
    /// Most recent order
    Latest,
    /// Orders in one status
    List {
        #[arg(long, default_value = "pending")]
        status: OrderStatus,
    },
    /// One order with its items
    Show { id: OrderId },
}

#[derive(Subcommand)]
enum WishlistAction {
    List,
    Add { product_id: ProductId },
    Rm { product_id: ProductId },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            telemetry::init_tracing(marigold_storefront::config::LogFormat::Text);
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    // Sentry must be initialized before the subscriber
    let _sentry_guard = telemetry::init_sentry(&config);
    telemetry::init_tracing(config.log_format);

    let result: Result<(), Box<dyn std::error::Error>> = run(cli, config).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    let storefront = Storefront::from_config(config)?;
    let confirmer = prompt::confirmer(cli.yes);
    let mut out = std::io::stdout().lock();

    let result = dispatch(cli.command, &storefront, confirmer.as_ref(), &mut out).await;

    if let Err(e) = &result {
        if e.is_unexpected() {
            tracing::error!(error = %e, "Unexpected failure");
        }
        prompt::show_notice(&e.notice());
    }
    result.map_err(Into::into)
}

async fn dispatch(
    command: Commands,
    storefront: &Storefront,
    confirmer: &dyn marigold_storefront::cart::Confirmer,
    out: &mut impl std::io::Write,
) -> Result<(), StorefrontError> {
    match command {
        Commands::Login {
            user_id,
            email,
            token,
        } => commands::account::login(storefront, user_id, &email, token, out).await,
        Commands::Logout => commands::account::logout(storefront, out).await,
        Commands::Whoami => commands::account::whoami(storefront, out).await,
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(storefront, out).await,
            CartAction::Add {
                product_id,
                quantity,
                color,
                size,
            } => commands::cart::add(storefront, product_id, quantity, color, size, out).await,
            CartAction::Qty { item, delta } => {
                commands::cart::change_quantity(storefront, item, delta, out).await
            }
            CartAction::Rm { item } => commands::cart::remove(storefront, item, confirmer, out).await,
            CartAction::Clear => commands::cart::clear(storefront, confirmer, out).await,
        },
        Commands::Checkout { action } => match action {
            CheckoutAction::Place(args) => commands::checkout::place(storefront, args, out).await,
            CheckoutAction::Resume => commands::checkout::resume(storefront, out).await,
        },
        Commands::Orders { action } => match action {
            OrdersAction::Latest => commands::orders::latest(storefront, out).await,
            OrdersAction::List { status } => commands::orders::list(storefront, status, out).await,
            OrdersAction::Show { id } => commands::orders::show(storefront, id, out).await,
        },
        Commands::Wishlist { action } => match action {
            WishlistAction::List => commands::wishlist::list(storefront, out).await,
            WishlistAction::Add { product_id } => {
                commands::wishlist::add(storefront, product_id, out).await
            }
            WishlistAction::Rm { product_id } => {
                commands::wishlist::remove(storefront, product_id, out).await
            }
        },
    }
}
