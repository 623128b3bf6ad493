use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use finhealth::core::log::init_logging;
use finhealth::core::metrics::MetricKind;
use finhealth::service::MetricRequest;

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

#[derive(Args, Clone)]
struct WindowArgs {
    /// Reporting currency, defaults to the configured one
    #[arg(long)]
    currency: Option<String>,

    /// First day of the window (YYYY-MM-DD)
    #[arg(long)]
    start: Option<String>,

    /// Last day of the window (YYYY-MM-DD), defaults to today
    #[arg(long)]
    end: Option<String>,
}

impl WindowArgs {
    fn into_request(self, user_id: Option<String>) -> MetricRequest {
        MetricRequest {
            user_id,
            currency: self.currency,
            start: self.start,
            end: self.end,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Fetch and display the current exchange rates
    Rates,
    /// List a user's income, expense and wealth fund records
    Analytics {
        /// Authenticated user id
        #[arg(short, long)]
        user: Option<String>,
        #[command(flatten)]
        window: WindowArgs,
        #[arg(long, default_value_t = 20)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        /// Print the JSON body instead of tables
        #[arg(long)]
        json: bool,
    },
    /// Compute one financial health metric as a JSON response
    Metric {
        /// Metric name, e.g. expenditure-delta or loans-to-assets
        metric: MetricKind,
        #[arg(short, long)]
        user: Option<String>,
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Display every metric for one or more users
    Report {
        #[arg(required = true)]
        users: Vec<String>,
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Show subscription, connected accounts and category settings
    More {
        #[arg(short, long)]
        user: Option<String>,
    },
}

impl From<Commands> for finhealth::AppCommand {
    fn from(cmd: Commands) -> finhealth::AppCommand {
        match cmd {
            Commands::Rates => finhealth::AppCommand::Rates,
            Commands::Analytics {
                user,
                window,
                limit,
                offset,
                json,
            } => finhealth::AppCommand::Analytics {
                request: window.into_request(user),
                limit,
                offset,
                json,
            },
            Commands::Metric {
                metric,
                user,
                window,
            } => finhealth::AppCommand::Metric {
                kind: metric,
                request: window.into_request(user),
            },
            Commands::Report { users, window } => finhealth::AppCommand::Report {
                users,
                request: window.into_request(None),
            },
            Commands::More { user } => finhealth::AppCommand::More { user_id: user },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => finhealth::cli::setup::setup_at_path(path),
            None => finhealth::cli::setup::setup(),
        },
        Some(cmd) => finhealth::run_command(cmd.into(), cli.config_path.as_deref()).await,
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
