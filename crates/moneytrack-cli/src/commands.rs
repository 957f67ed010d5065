//! Command handlers.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use chrono::{Datelike, Local};
use moneytrack_core::auth::{CredentialStore, SessionState, SessionStore};
use moneytrack_core::backend::{DEFAULT_POLL_INTERVAL, DEFAULT_WAKE_TIMEOUT};
use moneytrack_core::models::{month_key, CategoryFilter, TransactionInput};
use moneytrack_core::transport::{Navigator, RouteTracker, LOGIN_ROUTE};
use moneytrack_core::{ApiError, Config, FinanceClient};
use tracing::{debug, warn};

use crate::output;
use crate::{Cli, Command};

const WAKE_UP_FAILED: &str = "Server is taking longer than expected to wake up. Please try again.";
const SESSION_EXPIRED: &str = "Your session has expired. Run `moneytrack login` to sign in again.";
const STILL_SETTLING: &str = "Still signing you in. Try again in a moment.";

/// Everything one command needs: config, the shared session, the client,
/// and the route tracker standing in for browser navigation.
struct Context {
    config: Config,
    client: FinanceClient,
    navigator: Arc<RouteTracker>,
}

impl Context {
    fn new(route: &str) -> Result<Self> {
        let config = Config::load().context("Failed to load config")?;
        let store = SessionStore::new(config.cache_dir()?);

        let session = match SessionState::restore(store.clone(), config.settle_window()) {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Discarding unreadable saved session");
                store.clear()?;
                SessionState::restore(store, config.settle_window())?
            }
        };

        let navigator = Arc::new(RouteTracker::new(route));
        let client = FinanceClient::from_config(
            &config,
            Arc::new(session),
            Arc::clone(&navigator) as Arc<dyn Navigator>,
        )?;
        debug!(backend = client.base_url(), route, "Client ready");

        Ok(Self {
            config,
            client,
            navigator,
        })
    }
}

/// Route each command "visits". Auth commands run on auth routes, so a
/// failed refresh there never triggers a redirect.
fn route_for(command: &Command) -> &'static str {
    match command {
        Command::Login { .. } => LOGIN_ROUTE,
        Command::Signup { .. } => "/signup",
        Command::ForgotPassword { .. } => "/forgot-password",
        Command::ResetPassword { .. } => "/reset-password",
        Command::Analytics { .. } => "/analytics",
        _ => "/",
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let is_logout = matches!(cli.command, Command::Logout { .. });
    let mut ctx = Context::new(route_for(&cli.command))?;

    let result = dispatch(&mut ctx, cli.command).await;

    let sent_to_login = !is_logout && ctx.navigator.sent_to_login();
    report_session(result, sent_to_login, ctx.client.session().is_settling())
}

/// Turn a lost session into the message the user should see. A forced
/// return to the login route wins over whatever the command reported.
fn report_session(result: Result<()>, sent_to_login: bool, settling: bool) -> Result<()> {
    if sent_to_login {
        anyhow::bail!(SESSION_EXPIRED);
    }
    match result {
        Err(e) if is_unauthorized(&e) && settling => anyhow::bail!(STILL_SETTLING),
        Err(e) if is_unauthorized(&e) => anyhow::bail!(SESSION_EXPIRED),
        other => other,
    }
}

fn is_unauthorized(e: &anyhow::Error) -> bool {
    matches!(e.downcast_ref::<ApiError>(), Some(ApiError::Unauthorized))
}

async fn dispatch(ctx: &mut Context, command: Command) -> Result<()> {
    match command {
        Command::Login { username, remember } => login(ctx, username, remember).await,
        Command::Logout { forget } => logout(ctx, forget).await,
        Command::Whoami => {
            let user = ctx.client.me().await?;
            println!("{}", user.username);
            Ok(())
        }
        Command::Signup { username } => {
            let password = prompt_new_password()?;
            ctx.client.signup(&username, &password).await?;
            println!("Account created. Run `moneytrack login -u {}` to sign in.", username);
            Ok(())
        }
        Command::ForgotPassword { username } => {
            let ticket = ctx.client.request_password_reset(&username).await?;
            print!("{}", output::reset_ticket(&ticket));
            Ok(())
        }
        Command::ResetPassword { token } => {
            let password = prompt_new_password()?;
            let message = ctx.client.reset_password(&token, &password).await?;
            println!("{}", message);
            Ok(())
        }
        Command::Categories { kind } => {
            let categories = ctx.client.categories(kind).await?;
            print!("{}", output::category_list(kind, &categories));
            Ok(())
        }
        Command::AddCategory { name, kind } => {
            let categories = ctx.client.add_category(kind, &name).await?;
            print!("{}", output::category_list(kind, &categories));
            Ok(())
        }
        Command::DeleteCategory { name } => {
            ctx.client.delete_category(&name).await?;
            println!("Deleted category '{}'", name);
            Ok(())
        }
        Command::Add {
            kind,
            category,
            amount,
            date,
            description,
            months,
        } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let input = TransactionInput::new(kind, &category, amount, date)
                .description(&description)
                .recurring(months);
            ctx.client.create_transaction(&input).await?;
            println!("Transaction added!");
            Ok(())
        }
        Command::Edit {
            id,
            kind,
            category,
            amount,
            date,
            description,
        } => {
            let existing = ctx.client.transaction(id).await?;
            let mut input = TransactionInput::try_from(&existing)
                .with_context(|| format!("Transaction {} has an unreadable date", id))?;
            if let Some(kind) = kind {
                input.kind = kind;
            }
            if let Some(category) = category {
                input.category = category.trim().to_string();
            }
            if let Some(amount) = amount {
                input.amount = amount;
            }
            if let Some(date) = date {
                input.date = date;
            }
            if let Some(description) = description {
                input.description = description;
            }
            ctx.client.update_transaction(id, &input).await?;
            println!("Transaction updated!");
            Ok(())
        }
        Command::Delete { id } => {
            ctx.client.delete_transaction(id).await?;
            println!("Transaction {} deleted", id);
            Ok(())
        }
        Command::Show { id } => {
            let tx = ctx.client.transaction(id).await?;
            print!("{}", output::transaction_detail(&tx));
            Ok(())
        }
        Command::Analytics {
            year,
            month,
            category,
            currency,
            json,
        } => {
            let filter = CategoryFilter::parse(&category);
            let report = ctx.client.analytics(&filter).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }

            let year = year.unwrap_or_else(|| Local::now().year());
            let rendered = match month {
                Some(month) => {
                    output::month_report(&report, &month_key(year, month), &filter, &currency)
                }
                None => output::year_report(&report, year, &filter, &currency),
            };
            print!("{}", rendered);
            Ok(())
        }
    }
}

async fn login(ctx: &mut Context, username: Option<String>, remember: bool) -> Result<()> {
    let username = match username.or_else(|| ctx.config.last_username.clone()) {
        Some(username) => username,
        None => prompt("Username: ")?,
    };
    if username.is_empty() {
        anyhow::bail!("Username and password required");
    }

    let keychain = CredentialStore::for_backend(ctx.client.base_url());
    let stored = keychain.recall(&username).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to read remembered password");
        None
    });
    let used_stored = stored.is_some();
    let password = match stored {
        Some(password) => password,
        None => rpassword::prompt_password("Password: ")?,
    };
    if password.is_empty() {
        anyhow::bail!("Username and password required");
    }

    eprintln!("Connecting to {}...", ctx.client.base_url());
    if !ctx
        .client
        .wait_for_backend(DEFAULT_WAKE_TIMEOUT, DEFAULT_POLL_INTERVAL)
        .await
    {
        anyhow::bail!(WAKE_UP_FAILED);
    }

    if let Err(e) = ctx.client.login_with_retry(&username, &password).await {
        if used_stored && !e.is_network() {
            warn!(username = %username, "Remembered password was rejected");
        }
        anyhow::bail!(e.user_message());
    }

    if remember {
        if let Err(e) = keychain.remember(&username, &password) {
            warn!(error = %e, "Failed to store credentials");
        }
    }

    ctx.config.last_username = Some(username.clone());
    if let Err(e) = ctx.config.save() {
        warn!(error = %e, "Failed to save config");
    }

    // Leave the login route, as the browser would after signing in.
    ctx.navigator.enter("/");

    match ctx.client.me().await {
        Ok(user) => println!("Logged in as {}", user.username),
        Err(e) if is_unauthorized(&e) => {
            // The settling window keeps us on this route; the cookie may
            // simply not be usable yet.
            println!("Logged in as {}. {}", username, STILL_SETTLING);
        }
        Err(e) => return Err(e),
    }
    Ok(())
}

async fn logout(ctx: &mut Context, forget: bool) -> Result<()> {
    let username = ctx
        .client
        .session()
        .username()
        .or_else(|| ctx.config.last_username.clone());

    ctx.client.logout().await;

    if forget {
        if let Some(ref username) = username {
            CredentialStore::for_backend(ctx.client.base_url()).forget(username)?;
        }
    }
    println!("Logged out.");
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn prompt_new_password() -> Result<String> {
    let password = rpassword::prompt_password("New password: ")?;
    if password.is_empty() {
        anyhow::bail!("Password is required");
    }
    let confirm = rpassword::prompt_password("Confirm password: ")?;
    if password != confirm {
        anyhow::bail!("Passwords do not match");
    }
    Ok(password)
}

#[cfg(test)]
mod tests {
    use super::*;
    use moneytrack_core::models::TransactionKind;

    #[test]
    fn test_auth_commands_run_on_auth_routes() {
        use moneytrack_core::transport::is_auth_page;

        let login = Command::Login {
            username: None,
            remember: false,
        };
        assert_eq!(route_for(&login), LOGIN_ROUTE);
        assert!(is_auth_page(route_for(&Command::ResetPassword {
            token: "t".into()
        })));
        assert!(is_auth_page(route_for(&Command::Signup {
            username: "dana".into()
        })));

        assert!(!is_auth_page(route_for(&Command::Whoami)));
        assert!(!is_auth_page(route_for(&Command::Categories {
            kind: TransactionKind::Expense
        })));
    }

    #[test]
    fn test_unauthorized_detection_through_context() {
        let err = anyhow::Error::from(ApiError::Unauthorized).context("Failed to send GET request");
        assert!(is_unauthorized(&err));
        assert!(!is_unauthorized(&anyhow::anyhow!("other")));
    }

    fn unauthorized() -> Result<()> {
        Err(anyhow::Error::from(ApiError::Unauthorized).context("Failed to send GET request"))
    }

    fn message(result: Result<()>) -> String {
        result.unwrap_err().to_string()
    }

    #[test]
    fn test_redirect_reports_expired_session() {
        assert_eq!(message(report_session(Ok(()), true, false)), SESSION_EXPIRED);
        assert_eq!(message(report_session(unauthorized(), true, true)), SESSION_EXPIRED);
        assert_eq!(
            message(report_session(Err(anyhow::anyhow!("boom")), true, false)),
            SESSION_EXPIRED
        );
    }

    #[test]
    fn test_unauthorized_while_settling_is_neutral() {
        assert_eq!(message(report_session(unauthorized(), false, true)), STILL_SETTLING);
        assert_eq!(message(report_session(unauthorized(), false, false)), SESSION_EXPIRED);
    }

    #[test]
    fn test_other_results_pass_through() {
        assert!(report_session(Ok(()), false, true).is_ok());

        let err = report_session(Err(anyhow::anyhow!("Category name is required")), false, true);
        assert_eq!(message(err), "Category name is required");

        let not_found = ApiError::NotFound("Transaction not found".into());
        let err = report_session(Err(not_found.into()), false, false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ApiError>(),
            Some(ApiError::NotFound(_))
        ));
    }
}
