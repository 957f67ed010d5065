//! moneytrack - command-line client for the Money Tracker service.
//!
//! Each invocation is one "page visit": the command enters its route,
//! talks to the backend through the session transport, and reports a
//! forced return to the login route if the session was lost on the way.

mod commands;
mod output;

use std::io;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use moneytrack_core::models::TransactionKind;
use moneytrack_core::ApiError;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Directory for an additional daily-rotated log file
const LOG_DIR_ENV: &str = "MONEYTRACK_LOG_DIR";

#[derive(Parser)]
#[command(name = "moneytrack")]
#[command(about = "Track income and expenses from the terminal")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Sign in (waits for a sleeping backend first)
    Login {
        #[arg(long, short = 'u')]
        username: Option<String>,

        /// Remember the password in the OS keychain
        #[arg(long)]
        remember: bool,
    },

    /// Sign out and clear the saved session
    Logout {
        /// Also remove the remembered password
        #[arg(long)]
        forget: bool,
    },

    /// Show the signed-in user
    Whoami,

    /// Create an account
    Signup {
        #[arg(long, short = 'u')]
        username: String,
    },

    /// Request a password reset token
    ForgotPassword {
        #[arg(long, short = 'u')]
        username: String,
    },

    /// Set a new password with a reset token
    ResetPassword {
        #[arg(long)]
        token: String,
    },

    /// List categories of one type
    Categories {
        #[arg(long, short = 'k', default_value = "expense")]
        kind: TransactionKind,
    },

    /// Add a category
    AddCategory {
        name: String,

        #[arg(long, short = 'k', default_value = "expense")]
        kind: TransactionKind,
    },

    /// Delete a category by name
    DeleteCategory { name: String },

    /// Record a transaction
    Add {
        #[arg(long, short = 'k', default_value = "expense")]
        kind: TransactionKind,

        #[arg(long, short = 'c')]
        category: String,

        #[arg(long, short = 'a')]
        amount: f64,

        /// YYYY-MM-DD, defaults to today
        #[arg(long, short = 'd')]
        date: Option<NaiveDate>,

        #[arg(long, default_value = "")]
        description: String,

        /// Repeat monthly for this many months
        #[arg(long, default_value_t = 1)]
        months: u32,
    },

    /// Change fields of an existing transaction
    Edit {
        id: i64,

        #[arg(long, short = 'k')]
        kind: Option<TransactionKind>,

        #[arg(long, short = 'c')]
        category: Option<String>,

        #[arg(long, short = 'a')]
        amount: Option<f64>,

        #[arg(long, short = 'd')]
        date: Option<NaiveDate>,

        #[arg(long)]
        description: Option<String>,
    },

    /// Delete a transaction
    Delete { id: i64 },

    /// Show one transaction
    Show { id: i64 },

    /// Income and expense overview
    Analytics {
        /// Defaults to the current year
        #[arg(long, short = 'y')]
        year: Option<i32>,

        /// 1-12; shows one month instead of the whole year
        #[arg(long, short = 'm', value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,

        /// Category name, or "all"
        #[arg(long, short = 'c', default_value = "all")]
        category: String,

        #[arg(long, default_value = moneytrack_core::utils::DEFAULT_CURRENCY)]
        currency: String,

        /// Print the raw report as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Initialize the tracing subscriber for logging.
///
/// `RUST_LOG` controls the level (default `warn`). Logs go to stderr, and
/// also to a daily file when `MONEYTRACK_LOG_DIR` is set; the returned
/// guard must live until exit so the file writer flushes.
fn init_tracing() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var_os(LOG_DIR_ENV) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "moneytrack.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = init_tracing();
    info!("moneytrack starting");

    match commands::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<ApiError>() {
                Some(api_error) => eprintln!("Error: {}", api_error.user_message()),
                None => eprintln!("Error: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}
