pub mod auth;
pub mod rates;
pub mod resources;
pub mod setup;
pub mod ui;

use crate::App;
use crate::providers::access_control;
use crate::providers::auth_provider::{CheckOutcome, ErrorAction};
use crate::providers::http_client::HttpError;
use anyhow::{Result, anyhow, bail};

/// Fails unless the session is live and its roles allow `resource`.
pub(crate) async fn authorize(app: &App, resource: &str) -> Result<()> {
    match app.auth.check().await {
        CheckOutcome::Authenticated => {}
        CheckOutcome::Unauthenticated { .. } => bail!("Not logged in. Run `folio login` first."),
        CheckOutcome::SessionExpired { .. } => {
            bail!("Session expired. Run `folio login` to sign in again.")
        }
    }

    let decision = access_control::can_access(&app.auth, resource);
    if !decision.can {
        bail!(
            decision
                .reason
                .unwrap_or_else(|| format!("Access to {resource} denied"))
        );
    }
    Ok(())
}

/// Turns an API failure into a user-facing error, logging out on 401.
pub(crate) fn api_error(app: &App, err: HttpError) -> anyhow::Error {
    match app.auth.on_error(&err) {
        ErrorAction::Logout { .. } => anyhow!("{err} (run `folio login`)"),
        ErrorAction::Propagate => match err.errors() {
            Some(violations) => anyhow!("{err}: {violations}"),
            None => err.into(),
        },
    }
}
