//! Account command implementations

use anyhow::{Context, Result};
use slip_core::{Database, IdentityProvider};

use super::print_json;

pub async fn cmd_signup(
    db: &Database,
    email: &str,
    password: &str,
    alias: &str,
    full_name: Option<&str>,
) -> Result<()> {
    let session = db
        .sign_up(email, password, alias, full_name)
        .await
        .context("Sign-up failed")?;

    println!("✅ Account created for {}", session.email);
    println!("   Forward receipts to: {}", session.email_alias);
    Ok(())
}

pub async fn cmd_login(db: &Database, email: &str, password: &str) -> Result<()> {
    let session = db
        .sign_in(email, password)
        .await
        .context("Sign-in failed")?;

    println!("✅ Signed in as {}", session.email);
    Ok(())
}

pub async fn cmd_logout(db: &Database) -> Result<()> {
    db.sign_out().await.context("Sign-out failed")?;
    println!("👋 Signed out");
    Ok(())
}

pub async fn cmd_whoami(db: &Database, json: bool) -> Result<()> {
    let session = db
        .current_session()
        .await
        .context("Failed to read session")?;

    if json {
        return print_json(&session);
    }

    match session {
        Some(session) => {
            println!("👤 {}", session.full_name.as_deref().unwrap_or(&session.email));
            println!("   Email: {}", session.email);
            println!("   Alias: {}", session.email_alias);
        }
        None => println!("Not signed in."),
    }
    Ok(())
}
