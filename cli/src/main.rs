mod commands;
mod config;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use std::process;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    RxFilter, cmd_chat_clear, cmd_chat_log, cmd_chat_send, cmd_diet_add, cmd_diet_clear,
    cmd_diet_delete, cmd_diet_list, cmd_diet_update, cmd_login, cmd_logout, cmd_med_add,
    cmd_med_clear, cmd_med_delete, cmd_med_history, cmd_med_list, cmd_med_log, cmd_med_unlog,
    cmd_med_update, cmd_reset, cmd_rx_add, cmd_rx_archive, cmd_rx_clear, cmd_rx_delete,
    cmd_rx_list, cmd_signup, cmd_symptom_add, cmd_symptom_clear, cmd_symptom_delete,
    cmd_symptom_history, cmd_symptom_list, cmd_symptom_log, cmd_symptom_unlog,
    cmd_symptom_update, cmd_whoami,
};
use crate::config::Config;
use carelog_core::service::CareService;

#[derive(Parser)]
#[command(
    name = "carelog",
    version,
    about = "A personal health log: diet, medications, symptoms, prescriptions",
    long_about = "\n\n   ██████╗ █████╗ ██████╗ ███████╗██╗      ██████╗  ██████╗
  ██╔════╝██╔══██╗██╔══██╗██╔════╝██║     ██╔═══██╗██╔════╝
  ██║     ███████║██████╔╝█████╗  ██║     ██║   ██║██║  ███╗
  ██║     ██╔══██║██╔══██╗██╔══╝  ██║     ██║   ██║██║   ██║
  ╚██████╗██║  ██║██║  ██║███████╗███████╗╚██████╔╝╚██████╔╝
   ╚═════╝╚═╝  ╚═╝╚═╝  ╚═╝╚══════╝╚══════╝ ╚═════╝  ╚═════╝
        keep track of how you're doing.
"
)]
struct Cli {
    /// Increase log output (-v info, -vv debug, -vvv trace). `RUST_LOG` wins if set.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a local account and sign in
    Signup {
        /// Email address
        email: String,
        /// Display name
        #[arg(long)]
        name: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sign in to an existing local account
    Login {
        /// Email address
        email: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sign out; records stay on disk for the next sign-in
    Logout {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the signed-in user and record counts
    Whoami {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Food diary
    #[command(subcommand)]
    Diet(DietCommands),
    /// Medications and the doses taken
    #[command(subcommand)]
    Med(MedCommands),
    /// Symptoms and their severity over time
    #[command(subcommand)]
    Symptom(SymptomCommands),
    /// Saved prescriptions
    #[command(subcommand)]
    Rx(RxCommands),
    /// Chat log
    #[command(subcommand)]
    Chat(ChatCommands),
    /// Delete every record of the signed-in user
    Reset {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum DietCommands {
    /// Log something you ate
    Add {
        /// Food name
        name: String,
        /// Weight in grams (e.g. "150" or "150g")
        weight: String,
        /// When it was eaten (YYYY-MM-DD, YYYY-MM-DDTHH:MM, today, yesterday; default: now)
        #[arg(long)]
        at: Option<String>,
        /// Photo URI
        #[arg(long)]
        image: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List diet entries, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change a diet entry
    Update {
        /// Entry ID (or unique prefix)
        id: String,
        /// New food name
        #[arg(long)]
        name: Option<String>,
        /// New weight in grams
        #[arg(short, long)]
        weight: Option<String>,
        /// New time
        #[arg(long)]
        at: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a diet entry
    Delete {
        /// Entry ID (or unique prefix)
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete all diet entries
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum MedCommands {
    /// Add a medication, recording the first dose as taken (or missed)
    Add {
        /// Medication name
        name: String,
        /// Type: prescription, supplement, vitamin, other
        #[arg(short = 't', long = "type", default_value = "prescription")]
        kind: String,
        /// Record the first dose as missed instead of taken
        #[arg(long)]
        missed: bool,
        /// When the first dose was due (default: now)
        #[arg(long)]
        at: Option<String>,
        /// Photo URI
        #[arg(long)]
        image: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log a dose of an existing medication
    Log {
        /// Medication ID (or unique prefix)
        medication: String,
        /// Dosage (e.g. "500mg", "2 tablets")
        dosage: String,
        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
        /// When it was taken (default: now)
        #[arg(long)]
        at: Option<String>,
        /// Photo URI
        #[arg(long)]
        image: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a logged dose
    Unlog {
        /// Medication ID (or unique prefix)
        medication: String,
        /// Dose ID (or unique prefix)
        record: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List medications
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Every logged dose across all medications, newest first
    History {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rename a medication or change its type
    Update {
        /// Medication ID (or unique prefix)
        id: String,
        /// New name
        #[arg(long)]
        name: Option<String>,
        /// New type: prescription, supplement, vitamin, other
        #[arg(short = 't', long = "type")]
        kind: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a medication and all of its doses
    Delete {
        /// Medication ID (or unique prefix)
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete all medications
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum SymptomCommands {
    /// Start tracking a symptom with its current severity
    Add {
        /// Symptom name
        name: String,
        /// Severity from 0 (none) to 10 (worst)
        #[arg(allow_negative_numbers = true)]
        severity: i64,
        /// When it was felt (default: now)
        #[arg(long)]
        at: Option<String>,
        /// Photo URI
        #[arg(long)]
        image: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record a new severity reading for a tracked symptom
    Log {
        /// Symptom ID (or unique prefix)
        symptom: String,
        /// Severity from 0 (none) to 10 (worst)
        #[arg(allow_negative_numbers = true)]
        severity: i64,
        /// When it was felt (default: now)
        #[arg(long)]
        at: Option<String>,
        /// Photo URI
        #[arg(long)]
        image: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a severity reading
    Unlog {
        /// Symptom ID (or unique prefix)
        symptom: String,
        /// Reading ID (or unique prefix)
        record: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List tracked symptoms with their latest reading
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Every reading across all symptoms, newest first
    History {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rename a symptom
    Update {
        /// Symptom ID (or unique prefix)
        id: String,
        /// New name
        #[arg(long)]
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a symptom and all of its readings
    Delete {
        /// Symptom ID (or unique prefix)
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete all symptoms
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum RxCommands {
    /// Save a prescription
    Add {
        /// Prescription text
        text: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Archive a prescription
    Archive {
        /// Prescription ID (or unique prefix)
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List active prescriptions
    List {
        /// Show archived prescriptions instead
        #[arg(long, conflicts_with = "all")]
        archived: bool,
        /// Show active and archived prescriptions
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a prescription
    Delete {
        /// Prescription ID (or unique prefix)
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete all prescriptions
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ChatCommands {
    /// Add a message to the chat log
    Send {
        /// Message text, or an image URI with --image
        content: String,
        /// Treat the content as an image URI
        #[arg(long)]
        image: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the chat log, oldest first
    Log {
        /// Only show the last N messages
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete all messages
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    debug!(path = %config.db_path.display(), "opening database");
    let mut service = CareService::new(&config.db_path)?;
    let service = &mut service;

    match cli.command {
        Commands::Signup { email, name, json } => {
            cmd_signup(service, &email, name.as_deref(), json)
        }
        Commands::Login { email, json } => cmd_login(service, &email, json),
        Commands::Logout { json } => cmd_logout(service, json),
        Commands::Whoami { json } => cmd_whoami(service, json),
        Commands::Diet(cmd) => run_diet(service, cmd),
        Commands::Med(cmd) => run_med(service, cmd),
        Commands::Symptom(cmd) => run_symptom(service, cmd),
        Commands::Rx(cmd) => run_rx(service, cmd),
        Commands::Chat(cmd) => run_chat(service, cmd),
        Commands::Reset { yes, json } => cmd_reset(service, yes, json),
    }
}

fn run_diet(service: &mut CareService, cmd: DietCommands) -> Result<()> {
    match cmd {
        DietCommands::Add {
            name,
            weight,
            at,
            image,
            json,
        } => cmd_diet_add(service, &name, &weight, at, image, json),
        DietCommands::List { json } => cmd_diet_list(service, json),
        DietCommands::Update {
            id,
            name,
            weight,
            at,
            json,
        } => cmd_diet_update(service, &id, name.as_deref(), weight.as_deref(), at, json),
        DietCommands::Delete { id, json } => cmd_diet_delete(service, &id, json),
        DietCommands::Clear { yes, json } => cmd_diet_clear(service, yes, json),
    }
}

fn run_med(service: &mut CareService, cmd: MedCommands) -> Result<()> {
    match cmd {
        MedCommands::Add {
            name,
            kind,
            missed,
            at,
            image,
            json,
        } => cmd_med_add(service, &name, &kind, missed, at, image, json),
        MedCommands::Log {
            medication,
            dosage,
            notes,
            at,
            image,
            json,
        } => cmd_med_log(service, &medication, &dosage, notes, at, image, json),
        MedCommands::Unlog {
            medication,
            record,
            json,
        } => cmd_med_unlog(service, &medication, &record, json),
        MedCommands::List { json } => cmd_med_list(service, json),
        MedCommands::History { json } => cmd_med_history(service, json),
        MedCommands::Update {
            id,
            name,
            kind,
            json,
        } => cmd_med_update(service, &id, name.as_deref(), kind.as_deref(), json),
        MedCommands::Delete { id, json } => cmd_med_delete(service, &id, json),
        MedCommands::Clear { yes, json } => cmd_med_clear(service, yes, json),
    }
}

fn run_symptom(service: &mut CareService, cmd: SymptomCommands) -> Result<()> {
    match cmd {
        SymptomCommands::Add {
            name,
            severity,
            at,
            image,
            json,
        } => cmd_symptom_add(service, &name, severity, at, image, json),
        SymptomCommands::Log {
            symptom,
            severity,
            at,
            image,
            json,
        } => cmd_symptom_log(service, &symptom, severity, at, image, json),
        SymptomCommands::Unlog {
            symptom,
            record,
            json,
        } => cmd_symptom_unlog(service, &symptom, &record, json),
        SymptomCommands::List { json } => cmd_symptom_list(service, json),
        SymptomCommands::History { json } => cmd_symptom_history(service, json),
        SymptomCommands::Update { id, name, json } => {
            cmd_symptom_update(service, &id, &name, json)
        }
        SymptomCommands::Delete { id, json } => cmd_symptom_delete(service, &id, json),
        SymptomCommands::Clear { yes, json } => cmd_symptom_clear(service, yes, json),
    }
}

fn run_rx(service: &mut CareService, cmd: RxCommands) -> Result<()> {
    match cmd {
        RxCommands::Add { text, json } => cmd_rx_add(service, &text, json),
        RxCommands::Archive { id, json } => cmd_rx_archive(service, &id, json),
        RxCommands::List {
            archived,
            all,
            json,
        } => {
            let filter = if all {
                RxFilter::All
            } else if archived {
                RxFilter::Archived
            } else {
                RxFilter::Active
            };
            cmd_rx_list(service, filter, json)
        }
        RxCommands::Delete { id, json } => cmd_rx_delete(service, &id, json),
        RxCommands::Clear { yes, json } => cmd_rx_clear(service, yes, json),
    }
}

fn run_chat(service: &mut CareService, cmd: ChatCommands) -> Result<()> {
    match cmd {
        ChatCommands::Send {
            content,
            image,
            json,
        } => cmd_chat_send(service, &content, image, json),
        ChatCommands::Log { limit, json } => cmd_chat_log(service, limit, json),
        ChatCommands::Clear { yes, json } => cmd_chat_clear(service, yes, json),
    }
}
