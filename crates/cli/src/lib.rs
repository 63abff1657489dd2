pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use skyrchitect_core::config::{AppConfig, LoadOptions, LogFormat};

#[derive(Debug, Parser)]
#[command(
    name = "skyrchitect",
    about = "Skyrchitect operator CLI",
    long_about = "Inspect the service catalog, price and validate architectures, and call the \
                  deterministic agent tools without a model in the loop.",
    after_help = "Examples:\n  skyrchitect catalog --provider aws --category database\n  \
                  skyrchitect cost --file arch.json --budget low\n  \
                  skyrchitect tools call get_aws_service_info --args '{\"service_category\":\"storage\",\"service_name\":\"s3\"}'"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a skyrchitect.toml file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "List catalog entries, optionally filtered by provider and category")]
    Catalog {
        #[arg(long)]
        provider: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
    #[command(about = "Price an architecture file and assess it against a budget hint")]
    Cost {
        #[arg(long, help = "Architecture JSON with nodes and edges")]
        file: PathBuf,
        #[arg(long, default_value = "medium", help = "low|medium|high or an amount like $250")]
        budget: String,
    },
    #[command(about = "Score an architecture file for security, scalability and reliability")]
    Validate {
        #[arg(long, help = "Architecture JSON with nodes and edges")]
        file: PathBuf,
    },
    #[command(about = "Suggest strictly cheaper alternatives for one service")]
    Optimize {
        #[arg(long)]
        category: String,
        #[arg(long)]
        service: String,
        #[arg(long = "require", help = "Capability every alternative must carry")]
        required: Vec<String>,
        #[arg(long = "prefer", help = "Capability counted in the gap when missing")]
        optional: Vec<String>,
    },
    #[command(about = "Map a service to its counterpart in other providers")]
    Equivalents {
        #[arg(long)]
        category: String,
        #[arg(long)]
        service: String,
        #[arg(long = "provider", help = "Target providers (defaults to all)")]
        providers: Vec<String>,
    },
    #[command(about = "List or invoke the agent tools")]
    Tools {
        #[command(subcommand)]
        action: ToolsCommand,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

#[derive(Debug, Subcommand)]
enum ToolsCommand {
    #[command(about = "List registered tools with their parameter schemas")]
    List,
    #[command(about = "Invoke one tool with JSON arguments")]
    Call {
        name: String,
        #[arg(long, default_value = "{}")]
        args: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config.clone(),
        require_file: cli.config.is_some(),
    };
    if let Ok(config) = AppConfig::load(options) {
        init_logging(&config);
    }

    let result = match cli.command {
        Command::Catalog { provider, category } => {
            commands::catalog::run(provider.as_deref(), category.as_deref())
        }
        Command::Cost { file, budget } => commands::cost::run(&file, &budget),
        Command::Validate { file } => commands::validate::run(&file),
        Command::Optimize { category, service, required, optional } => {
            commands::optimize::run(&category, &service, &required, &optional)
        }
        Command::Equivalents { category, service, providers } => {
            commands::equivalents::run(&category, &service, &providers)
        }
        Command::Tools { action: ToolsCommand::List } => commands::tools::list(),
        Command::Tools { action: ToolsCommand::Call { name, args } } => {
            commands::tools::call(&name, &args)
        }
        Command::Config => commands::config::run(cli.config.as_deref()),
    };

    tracing::debug!(event_name = "cli.command.finished", exit_code = result.exit_code);
    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::WARN);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
