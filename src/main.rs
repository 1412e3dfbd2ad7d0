use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use folio::cli::setup::setup;
use folio::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct ListCommand {
    /// Resource to list, e.g. assets, crypto, wallets
    resource: String,
    /// Filter as `field[:op]=value`; repeatable
    #[arg(short, long = "filter")]
    filters: Vec<String>,
    /// Sort as `field[:asc|desc]`; repeatable
    #[arg(short, long)]
    sort: Vec<String>,
    /// Page number, starting at 1
    #[arg(long)]
    page: Option<u32>,
    /// Items per page
    #[arg(long)]
    per_page: Option<u32>,
    /// Columns to display, dotted paths allowed (e.g. indicators.adx)
    #[arg(long, value_delimiter = ',')]
    columns: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Sign in and store the session token
    Login {
        username: String,
        /// Prompted for when omitted
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// List records of a resource
    List(ListCommand),
    /// Show one or more records
    Show {
        resource: String,
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Create a record from a JSON payload
    Create {
        resource: String,
        #[arg(short, long)]
        data: String,
    },
    /// Patch a record with a JSON payload
    Update {
        resource: String,
        id: String,
        #[arg(short, long)]
        data: String,
    },
    /// Delete a record
    Delete { resource: String, id: String },
    /// Display currency conversion rates
    Rates {
        /// Only show this currency
        #[arg(long)]
        currency: Option<String>,
    },
}

impl From<Commands> for folio::AppCommand {
    fn from(cmd: Commands) -> folio::AppCommand {
        match cmd {
            Commands::Login { username, password } => folio::AppCommand::Login { username, password },
            Commands::Logout => folio::AppCommand::Logout,
            Commands::Whoami => folio::AppCommand::Whoami,
            Commands::List(list) => folio::AppCommand::List(folio::ListArgs {
                resource: list.resource,
                filters: list.filters,
                sort: list.sort,
                page: list.page,
                per_page: list.per_page,
                columns: list.columns,
            }),
            Commands::Show { resource, ids } => folio::AppCommand::Show { resource, ids },
            Commands::Create { resource, data } => folio::AppCommand::Create { resource, data },
            Commands::Update { resource, id, data } => {
                folio::AppCommand::Update { resource, id, data }
            }
            Commands::Delete { resource, id } => folio::AppCommand::Delete { resource, id },
            Commands::Rates { currency } => folio::AppCommand::Rates { currency },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(cmd) => folio::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_list_arguments_map_to_app_command() {
        let cli = Cli::parse_from([
            "folio",
            "list",
            "crypto",
            "-f",
            "marketcap=1000,",
            "--filter",
            "tags:in=defi,l2",
            "-s",
            "marketcap:desc",
            "--columns",
            "name,indicators.adx",
        ]);
        let Some(cmd) = cli.command else {
            panic!("expected a subcommand");
        };
        let app_cmd: folio::AppCommand = cmd.into();
        let folio::AppCommand::List(args) = app_cmd else {
            panic!("expected list command");
        };
        assert_eq!(args.resource, "crypto");
        assert_eq!(args.filters, vec!["marketcap=1000,", "tags:in=defi,l2"]);
        assert_eq!(args.sort, vec!["marketcap:desc"]);
        assert_eq!(args.columns, vec!["name", "indicators.adx"]);
        assert!(args.page.is_none());
    }
}
