//! Guichet CLI - batch jobs and instructor actions for the DS sync
//!
//! Each subcommand maps to one scheduled job or one back-office action;
//! connection settings come from the environment (or a local `.env`).

use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::aot::Generator;
use clap_complete::{generate, shells};
use guichet_core::config::{DsConfig, EmailConfig};
use guichet_core::db::{
    AccountUpdateRequestRepository, Database, LibSqlAccountUpdateRequestRepository,
    LibSqlUserRepository, UserRepository,
};
use guichet_core::ds::{DsGraphqlClient, SyncService};
use guichet_core::email::HttpEmailOutbox;
use guichet_core::{AccountUpdateRequest, DossierStatus, User};
use serde::Serialize;
use thiserror::Error;

#[derive(Parser)]
#[command(name = "guichet")]
#[command(about = "Synchronize account-update dossiers with the DS API")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Optional path to local database file
    #[arg(long, value_name = "PATH")]
    db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the DS API and reconcile every account-update dossier
    Sync {
        /// Override the procedure number from the environment
        #[arg(long, value_name = "NUMBER")]
        procedure: Option<i64>,
        /// Resume pagination from this cursor instead of the first page
        #[arg(long, value_name = "CURSOR")]
        cursor: Option<String>,
        /// Classify requests idle for 30 days without continuation
        #[arg(long)]
        sweep: bool,
        /// Instructor email acting on swept requests (required with --sweep)
        #[arg(long, value_name = "EMAIL", required_if_eq("sweep", "true"))]
        instructor: Option<String>,
    },
    /// Copy remote instructor ids onto matching local admin accounts
    SyncInstructors {
        /// Override the procedure number from the environment
        #[arg(long, value_name = "NUMBER")]
        procedure: Option<i64>,
    },
    /// Remove local records of dossiers deleted on the remote side
    SyncDeleted {
        /// Override the procedure number from the environment
        #[arg(long, value_name = "NUMBER")]
        procedure: Option<i64>,
    },
    /// Transition one request to a new state through the DS API
    UpdateState {
        /// Remote application number
        #[arg(long, value_name = "NUMBER")]
        application: i64,
        /// Target state
        #[arg(long, value_enum)]
        target: TargetState,
        /// Instructor email acting on the dossier
        #[arg(long, value_name = "EMAIL")]
        instructor: String,
        /// Motivation shown to the applicant
        #[arg(long, value_name = "TEXT")]
        motivation: Option<String>,
    },
    /// Archive one dossier remotely and drop its local record
    Archive {
        /// Remote application number
        #[arg(long, value_name = "NUMBER")]
        application: i64,
        /// Instructor email acting on the dossier
        #[arg(long, value_name = "EMAIL")]
        instructor: String,
        /// Motivation, used when the dossier must first be classified
        #[arg(long, value_name = "TEXT")]
        motivation: Option<String>,
    },
    /// List local account-update records
    List {
        /// Number of records to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

/// States an instructor can drive a request to. Draft is remote-only.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum TargetState {
    OnGoing,
    Accepted,
    Refused,
    WithoutContinuation,
}

impl TargetState {
    const fn to_status(self) -> DossierStatus {
        match self {
            Self::OnGoing => DossierStatus::OnGoing,
            Self::Accepted => DossierStatus::Accepted,
            Self::Refused => DossierStatus::Refused,
            Self::WithoutContinuation => DossierStatus::WithoutContinuation,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Core(#[from] guichet_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No local account found for instructor email: {0}")]
    InstructorNotFound(String),
    #[error("{0} is not an admin account")]
    NotAnAdmin(String),
    #[error("--sweep requires --instructor")]
    SweepWithoutInstructor,
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("guichet=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Commands::Sync {
            procedure,
            cursor,
            sweep,
            instructor,
        } => run_sync(procedure, cursor, sweep, instructor.as_deref(), &db_path).await?,
        Commands::SyncInstructors { procedure } => {
            run_sync_instructors(procedure, &db_path).await?;
        }
        Commands::SyncDeleted { procedure } => run_sync_deleted(procedure, &db_path).await?,
        Commands::UpdateState {
            application,
            target,
            instructor,
            motivation,
        } => run_update_state(application, target, &instructor, motivation, &db_path).await?,
        Commands::Archive {
            application,
            instructor,
            motivation,
        } => run_archive(application, &instructor, motivation, &db_path).await?,
        Commands::List { limit, json } => run_list(limit, json, &db_path).await?,
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref())?,
    }

    Ok(())
}

async fn run_sync(
    procedure: Option<i64>,
    cursor: Option<String>,
    sweep: bool,
    instructor_email: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let ds_config = DsConfig::from_env()?;
    let api = DsGraphqlClient::new(&ds_config.api_url, &ds_config.api_token)?;
    let outbox = email_outbox_from_env()?;
    let procedure = procedure.unwrap_or(ds_config.procedure_number);
    let service = SyncService::new(&db, &api, &outbox, procedure);

    let sweep_instructor = if sweep {
        let email = instructor_email.ok_or(CliError::SweepWithoutInstructor)?;
        Some(resolve_instructor(&db, email).await?)
    } else {
        None
    };

    let outcome = service
        .sync_applications(
            cursor,
            sweep_instructor.as_ref(),
            chrono::Utc::now().timestamp_millis(),
        )
        .await?;

    println!(
        "Reconciled {} request(s), removed {}, marked {} without continuation",
        outcome.reconciled, outcome.deleted, outcome.marked_without_continuation
    );
    Ok(())
}

async fn run_sync_instructors(procedure: Option<i64>, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let ds_config = DsConfig::from_env()?;
    let api = DsGraphqlClient::new(&ds_config.api_url, &ds_config.api_token)?;
    let outbox = email_outbox_from_env()?;
    let procedure = procedure.unwrap_or(ds_config.procedure_number);
    let service = SyncService::new(&db, &api, &outbox, procedure);

    let updated = service.sync_instructor_ids().await?;
    println!("Updated {updated} instructor id(s)");
    Ok(())
}

async fn run_sync_deleted(procedure: Option<i64>, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let ds_config = DsConfig::from_env()?;
    let api = DsGraphqlClient::new(&ds_config.api_url, &ds_config.api_token)?;
    let outbox = email_outbox_from_env()?;
    let procedure = procedure.unwrap_or(ds_config.procedure_number);
    let service = SyncService::new(&db, &api, &outbox, procedure);

    let deleted = service.sync_deleted_applications().await?;
    println!("Removed {deleted} record(s) of deleted dossiers");
    Ok(())
}

async fn run_update_state(
    application: i64,
    target: TargetState,
    instructor_email: &str,
    motivation: Option<String>,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let ds_config = DsConfig::from_env()?;
    let api = DsGraphqlClient::new(&ds_config.api_url, &ds_config.api_token)?;
    let outbox = email_outbox_from_env()?;
    let service = SyncService::new(&db, &api, &outbox, ds_config.procedure_number);

    let instructor = resolve_instructor(&db, instructor_email).await?;
    let updated = service
        .update_state(application, target.to_status(), &instructor, motivation)
        .await?;

    println!("{} -> {}", updated.application_number, updated.status);
    Ok(())
}

async fn run_archive(
    application: i64,
    instructor_email: &str,
    motivation: Option<String>,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let ds_config = DsConfig::from_env()?;
    let api = DsGraphqlClient::new(&ds_config.api_url, &ds_config.api_token)?;
    let outbox = email_outbox_from_env()?;
    let service = SyncService::new(&db, &api, &outbox, ds_config.procedure_number);

    let instructor = resolve_instructor(&db, instructor_email).await?;
    service.archive(application, &instructor, motivation).await?;

    println!("Archived {application}");
    Ok(())
}

#[derive(Debug, Serialize)]
struct RequestListItem {
    application_number: i64,
    status: String,
    email: Option<String>,
    update_types: Vec<String>,
    flags: Vec<String>,
    matched_user: Option<String>,
    date_last_status_update: i64,
}

async fn run_list(limit: usize, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let repo = LibSqlAccountUpdateRequestRepository::new(db.connection());
    let mut requests = repo.list().await?;
    requests.truncate(limit);

    if as_json {
        let items = requests
            .iter()
            .map(request_to_list_item)
            .collect::<Vec<RequestListItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for line in format_request_lines(&requests) {
            println!("{line}");
        }
    }

    Ok(())
}

fn run_completions(shell: CompletionShell, output_path: Option<&Path>) -> Result<(), CliError> {
    let mut command = Cli::command();
    let mut buffer = Vec::new();

    match shell {
        CompletionShell::Bash => generate_for_shell(shells::Bash, &mut command, &mut buffer),
        CompletionShell::Zsh => generate_for_shell(shells::Zsh, &mut command, &mut buffer),
        CompletionShell::Fish => generate_for_shell(shells::Fish, &mut command, &mut buffer),
    }

    if let Some(path) = output_path {
        std::fs::write(path, &buffer)?;
        println!("{}", path.display());
    } else {
        io::stdout().write_all(&buffer)?;
    }

    Ok(())
}

fn generate_for_shell<G: Generator>(
    generator: G,
    command: &mut clap::Command,
    buffer: &mut Vec<u8>,
) {
    generate(generator, command, "guichet", buffer);
}

fn request_to_list_item(request: &AccountUpdateRequest) -> RequestListItem {
    RequestListItem {
        application_number: request.application_number,
        status: request.status.to_string(),
        email: request.email.clone(),
        update_types: request
            .update_types
            .iter()
            .map(|update_type| format!("{update_type:?}"))
            .collect(),
        flags: request.flags.iter().map(|flag| format!("{flag:?}")).collect(),
        matched_user: request.user_id.map(|id| id.to_string()),
        date_last_status_update: request.date_last_status_update,
    }
}

fn format_request_lines(requests: &[AccountUpdateRequest]) -> Vec<String> {
    requests
        .iter()
        .map(|request| {
            let email = request.email.as_deref().unwrap_or("-");
            let status = request.status.to_string();
            let flags = if request.flags.is_empty() {
                String::new()
            } else {
                format!(
                    "  [{}]",
                    request
                        .flags
                        .iter()
                        .map(|flag| format!("{flag:?}"))
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            };
            format!(
                "{:<10}  {status:<21}  {email}{flags}",
                request.application_number
            )
        })
        .collect()
}

async fn resolve_instructor(db: &Database, email: &str) -> Result<User, CliError> {
    let users = LibSqlUserRepository::new(db.connection());
    let user = users
        .find_by_email(email)
        .await?
        .ok_or_else(|| CliError::InstructorNotFound(email.to_string()))?;

    if !user.is_admin {
        return Err(CliError::NotAnAdmin(user.email));
    }

    Ok(user)
}

fn email_outbox_from_env() -> Result<HttpEmailOutbox, CliError> {
    let config = EmailConfig::from_env()?;
    Ok(HttpEmailOutbox::new(config.api_url, config.api_token)?)
}

fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("GUICHET_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("guichet")
        .join("guichet.db")
}

async fn open_database(path: &Path) -> Result<Database, CliError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Database::open(path).await?)
}
