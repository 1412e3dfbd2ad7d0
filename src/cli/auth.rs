use super::ui;
use crate::App;
use crate::providers::auth_provider::CheckOutcome;
use anyhow::{Context, Result};
use comfy_table::Cell;
use console::Term;

fn prompt_password() -> Result<String> {
    let term = Term::stderr();
    term.write_str("Password: ")
        .context("Failed to write password prompt")?;
    term.read_secure_line().context("Failed to read password")
}

pub async fn login(app: &App, username: &str, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => prompt_password()?,
    };

    let pb = ui::new_spinner("Signing in");
    let result = app.auth.login(username, &password).await;
    pb.finish_and_clear();

    let user = result?;
    println!(
        "Logged in as {}",
        ui::style_text(&user.name, ui::StyleType::Success)
    );
    Ok(())
}

pub fn logout(app: &App) -> Result<()> {
    app.auth.logout();
    println!("Logged out");
    Ok(())
}

pub async fn whoami(app: &App) -> Result<()> {
    match app.auth.check().await {
        CheckOutcome::Authenticated => {}
        CheckOutcome::Unauthenticated { .. } => {
            println!("{}", ui::style_text("Not logged in", ui::StyleType::Subtle));
            return Ok(());
        }
        CheckOutcome::SessionExpired { .. } => {
            println!(
                "{}",
                ui::style_text("Session expired, please log in again", ui::StyleType::Error)
            );
            return Ok(());
        }
    }

    let Some(identity) = app.auth.get_identity() else {
        println!("{}", ui::style_text("Not logged in", ui::StyleType::Subtle));
        return Ok(());
    };

    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Field"), ui::header_cell("Value")]);
    table.add_row(vec![Cell::new("Name"), Cell::new(&identity.name)]);
    table.add_row(vec![Cell::new("Id"), Cell::new(ui::value_text(&identity.id))]);
    table.add_row(vec![
        Cell::new("Email"),
        Cell::new(identity.email.as_deref().unwrap_or("N/A")),
    ]);
    table.add_row(vec![
        Cell::new("Roles"),
        Cell::new(app.auth.get_permissions().join(", ")),
    ]);
    println!("{table}");
    Ok(())
}
