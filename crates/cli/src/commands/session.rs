//! Sign-in, sign-out and store selection.
//!
//! # Usage
//!
//! ```bash
//! BENTO_PASSWORD=secret bento login customer1
//! bento whoami
//! bento store select 1
//! bento logout
//! ```

use std::io::{self, BufRead};

use bento_client::MigrationStatus;
use bento_core::StoreId;
use secrecy::SecretString;

use super::Context;
use crate::output;

fn read_password() -> io::Result<SecretString> {
    if let Ok(password) = std::env::var("BENTO_PASSWORD") {
        return Ok(SecretString::from(password));
    }
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(SecretString::from(line.trim_end_matches(['\r', '\n']).to_string()))
}

pub async fn login(ctx: &Context, username: &str, redirect: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let password = read_password()?;
    let outcome = ctx.auth().login(username, &password, redirect).await?;

    output::line(&format!("Signed in as {}", outcome.user.display_name()));
    match outcome.migration {
        MigrationStatus::Completed(report) if report.migrated_lines > 0 => {
            output::line(&format!("Moved {} cart item(s) into your account", report.migrated_lines));
        }
        MigrationStatus::Failed(reason) => {
            tracing::warn!(reason = %reason, "Guest cart was not moved");
            output::line("Your guest cart could not be moved into your account.");
        }
        MigrationStatus::Pending(handle) => {
            // Let the migration finish before the process exits.
            match handle.await {
                Ok(Ok(report)) => tracing::info!(lines = report.migrated_lines, "Late cart migration finished"),
                Ok(Err(e)) => tracing::warn!(error = %e, "Late cart migration failed"),
                Err(e) => tracing::warn!(error = %e, "Late cart migration aborted"),
            }
        }
        MigrationStatus::Completed(_) | MigrationStatus::Skipped => {}
    }
    output::line(&format!("Next: {}", outcome.redirect));
    Ok(())
}

pub fn logout(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let next = ctx.auth().logout()?;
    output::line(&format!("Signed out. Next: {next}"));
    Ok(())
}

pub async fn whoami(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    if !ctx.session().is_authenticated() {
        output::line("Not signed in");
        return Ok(());
    }
    let user = ctx.auth().me().await?;
    output::user(&user);
    Ok(())
}

pub async fn select_store(ctx: &Context, store_id: i64) -> Result<(), Box<dyn std::error::Error>> {
    let store_id = StoreId::new(store_id);
    if ctx.session().guest_session_id().is_none() {
        ctx.api.create_guest_session().await?;
    }
    ctx.api.select_store(store_id).await?;
    output::line(&format!("Ordering from store {store_id}"));
    Ok(())
}
