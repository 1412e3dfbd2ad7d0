pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::cache::TtlCache;
use crate::core::config::AppConfig;
use crate::core::session::Session;
use crate::providers::{AuthProvider, CurrencyRates, DataProvider, HttpClient};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListArgs {
    pub resource: String,
    /// `field[:op]=value` expressions.
    pub filters: Vec<String>,
    /// `field[:asc|desc]` expressions.
    pub sort: Vec<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Dotted paths into each record; empty picks columns from the first row.
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    Login {
        username: String,
        password: Option<String>,
    },
    Logout,
    Whoami,
    List(ListArgs),
    Show {
        resource: String,
        ids: Vec<String>,
    },
    Create {
        resource: String,
        data: String,
    },
    Update {
        resource: String,
        id: String,
        data: String,
    },
    Delete {
        resource: String,
        id: String,
    },
    Rates {
        currency: Option<String>,
    },
}

/// Everything a command needs, wired from one configuration.
pub struct App {
    pub config: AppConfig,
    pub session: Arc<Session>,
    pub auth: AuthProvider,
    pub data: DataProvider,
    pub rates: CurrencyRates,
}

impl App {
    pub fn new(config: AppConfig) -> Result<Self> {
        let data_path = if config.session.persist {
            Some(config.default_data_path()?)
        } else {
            None
        };
        let store = store::open(data_path.as_deref(), config.session.persist);
        let session = Arc::new(Session::new(store));

        let http = Arc::new(
            HttpClient::new(&config.api.url, Arc::clone(&session))
                .context("Failed to create API client")?,
        );
        let auth = AuthProvider::new(config.api.auth_url(), Arc::clone(&session))
            .context("Failed to create auth client")?;
        let data = DataProvider::new(Arc::clone(&http), config.filters.clone())
            .with_page_size(config.list.items_per_page);
        let rates = CurrencyRates::new(http, Arc::new(TtlCache::new()));

        Ok(App {
            config,
            session,
            auth,
            data,
            rates,
        })
    }

    pub async fn run(&self, cmd: AppCommand) -> Result<()> {
        match cmd {
            AppCommand::Login { username, password } => {
                cli::auth::login(self, &username, password).await
            }
            AppCommand::Logout => cli::auth::logout(self),
            AppCommand::Whoami => cli::auth::whoami(self).await,
            AppCommand::List(args) => cli::resources::list(self, &args).await,
            AppCommand::Show { resource, ids } => cli::resources::show(self, &resource, &ids).await,
            AppCommand::Create { resource, data } => {
                cli::resources::create(self, &resource, &data).await
            }
            AppCommand::Update { resource, id, data } => {
                cli::resources::update(self, &resource, &id, &data).await
            }
            AppCommand::Delete { resource, id } => cli::resources::delete(self, &resource, &id).await,
            AppCommand::Rates { currency } => cli::rates::run(self, currency.as_deref()).await,
        }
    }
}

pub async fn run_command(cmd: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("folio starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    App::new(config)?.run(cmd).await
}
