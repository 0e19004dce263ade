use anyhow::Result;
use colored::Colorize;
use orgboard_sdk::{FileSessionStore, SignUpRequest};
use std::io::{self, Write};

use super::Context;
use crate::ui;

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut value = String::new();
    io::stdin().read_line(&mut value)?;
    Ok(value.trim().to_string())
}

pub async fn register(ctx: &Context) -> Result<()> {
    println!("{}", "Register for Orgboard".bold());
    println!();

    let username = prompt("Username: ")?;
    let password = rpassword::prompt_password("Password: ")?;
    let confirm_password = rpassword::prompt_password("Confirm password: ")?;
    let phone = prompt("Phone (optional): ")?;

    println!();
    ui::print_step("Creating account...");

    ctx.api
        .sign_up(SignUpRequest {
            username: username.clone(),
            password,
            confirm_password,
            phone: (!phone.is_empty()).then_some(phone),
        })
        .await?;

    ui::print_success(&format!("Account '{}' created", username));
    println!("Run 'ob auth login' to sign in.");
    Ok(())
}

pub async fn login(ctx: &Context) -> Result<()> {
    println!("{}", "Sign in to Orgboard".bold());
    println!();

    let username = prompt("Username: ")?;
    let password = rpassword::prompt_password("Password: ")?;

    println!();
    ui::print_step("Signing in...");

    let response = ctx.api.sign_in(&username, &password).await?;

    ui::print_success("Signed in");
    println!(
        "Username: {}",
        response.username.as_deref().unwrap_or(&username)
    );
    Ok(())
}

pub fn logout(ctx: &Context) -> Result<()> {
    ctx.api.sign_out()?;
    ui::print_success("Signed out");
    println!("Your token has been removed from this device.");
    Ok(())
}

pub fn status(ctx: &Context) -> Result<()> {
    let location = FileSessionStore::default_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "~/.orgboard/session.toml".to_string());

    if ctx.json {
        let status = serde_json::json!({
            "signedIn": ctx.session.is_signed_in(),
            "lastBoard": ctx.session.last_board(),
            "sessionFile": location,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    if ctx.session.is_signed_in() {
        ui::print_success("Signed in");
    } else {
        ui::print_error("Not signed in");
        println!();
        println!("Run 'ob auth login' to sign in.");
    }
    println!();
    println!("API:          {}", ctx.api.base_url());
    println!("Session file: {}", location);
    if let Some(board) = ctx.session.last_board() {
        println!("Last board:   {}", board);
    }
    Ok(())
}
