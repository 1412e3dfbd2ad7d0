use super::ui;
use crate::App;
use crate::core::CurrencyRateProvider;
use crate::providers::currency_rates::BASE_CURRENCY;
use anyhow::Result;
use comfy_table::{Cell, CellAlignment};

pub async fn run(app: &App, currency: Option<&str>) -> Result<()> {
    let pb = ui::new_spinner("Fetching currency rates");
    let table = app.rates.fetch().await;
    pb.finish_and_clear();

    if let Some(error) = app.rates.error() {
        println!(
            "{}",
            ui::style_text(
                &format!("Could not load rates ({error}); showing identity rates"),
                ui::StyleType::Error
            )
        );
    }

    let target = app.config.currency.as_str();
    let mut codes: Vec<&String> = match currency {
        Some(code) => table.keys().filter(|c| c.as_str() == code).collect(),
        None => table.keys().collect(),
    };
    codes.sort();

    if codes.is_empty() {
        println!("No rate available for {}", currency.unwrap_or_default());
        return Ok(());
    }

    let mut output = ui::new_styled_table();
    output.set_header(vec![
        ui::header_cell("Currency"),
        ui::header_cell(&format!("Value ({BASE_CURRENCY})")),
        ui::header_cell(&format!("Value ({target})")),
    ]);
    for code in codes {
        let in_target = CurrencyRateProvider::get_rate(&app.rates, code, target).await?;
        output.add_row(vec![
            Cell::new(code),
            Cell::new(format!("{:.4}", app.rates.get_rate(Some(code.as_str()))))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{in_target:.4}")).set_alignment(CellAlignment::Right),
        ]);
    }

    println!(
        "{}",
        ui::style_text("Currency rates", ui::StyleType::Title)
    );
    println!("{output}");
    Ok(())
}
