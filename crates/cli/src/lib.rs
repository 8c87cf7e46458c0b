pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use approvals_core::config::ConfigOverrides;
use approvals_core::{Decision, RequestStatus, SortField};
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "approvals",
    about = "Product request approval CLI",
    long_about = "List product requests and record approve/reject decisions against a JSON request file.",
    after_help = "Examples:\n  approvals list --status pending --sort submitted_at\n  approvals approve 42 --note \"within budget\"\n  approvals reject 43 --file requests.json --note \"duplicate\"\n  approvals config"
)]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    #[arg(long, global = true, help = "JSON request file (overrides source.path)")]
    file: Option<PathBuf>,
    #[arg(long, global = true, help = "Name recorded as the actor in the audit trail")]
    actor: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Render the request table with optional sorting and filtering")]
    List {
        #[arg(long, help = "Sort field: id|requester|item|status|submitted_at|decided_at")]
        sort: Option<SortField>,
        #[arg(long, help = "Sort the primary key in descending order")]
        desc: bool,
        #[arg(long, help = "Only show requests with this status")]
        status: Option<RequestStatus>,
        #[arg(long, help = "Case-insensitive search over id, requester and item")]
        search: Option<String>,
    },
    #[command(about = "Approve a pending request")]
    Approve {
        id: String,
        #[arg(long, help = "Decision note")]
        note: Option<String>,
    },
    #[command(about = "Reject a pending request")]
    Reject {
        id: String,
        #[arg(long, help = "Decision note")]
        note: Option<String>,
    },
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
}

impl GlobalArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            source_path: self.file.clone(),
            actor: self.actor.clone(),
            ..ConfigOverrides::default()
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let overrides = cli.global.overrides();

    logging::init_from_overrides(&overrides);

    let result = match cli.command {
        Command::List { sort, desc, status, search } => {
            commands::list::run(commands::list::ListArgs {
                sort,
                descending: desc,
                status,
                search,
                overrides,
            })
        }
        Command::Approve { id, note } => commands::decide::run(commands::decide::DecideArgs {
            decision: Decision::Approve,
            id,
            note,
            overrides,
        }),
        Command::Reject { id, note } => commands::decide::run(commands::decide::DecideArgs {
            decision: Decision::Reject,
            id,
            note,
            overrides,
        }),
        Command::Config => commands::CommandResult {
            exit_code: 0,
            output: commands::config::run(overrides),
        },
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
