// cvault - store, inspect, and edit spreadsheets from the command line
//
// Settings come from ~/.config/cellvault/config.toml plus CELLVAULT_*
// overrides. Results go to stdout; logs and errors go to stderr.

mod auth;
mod backend;
mod exit_codes;
mod output;

use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use cellvault_config::Settings;
use cellvault_engine::{CellValue, MutationRequest};
use cellvault_store::{FileSummary, Identity, IdentityProvider, ServiceError, SqliteIdentity};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use exit_codes::{
    exit_code_for, EXIT_ERROR, EXIT_INVALID_REQUEST, EXIT_SUCCESS, EXIT_UNAUTHORIZED, EXIT_USAGE,
};

#[derive(Parser)]
#[command(name = "cvault")]
#[command(about = "Store, inspect, and edit spreadsheets (xls/xlsx)")]
#[command(version)]
struct Cli {
    /// Bearer token (default: the token saved by `cvault login`)
    #[arg(long, global = true, env = "CELLVAULT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Config file (default: ~/.config/cellvault/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a user account
    Register {
        username: String,

        #[arg(long, default_value = "")]
        email: String,

        /// Password (read from stdin when omitted)
        #[arg(long, env = "CELLVAULT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Log in and save the token for later commands
    Login {
        username: String,

        /// Password (read from stdin when omitted)
        #[arg(long, env = "CELLVAULT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Revoke the current token and forget the saved login
    Logout,

    /// Print the user the current token belongs to
    Whoami,

    /// Upload an .xls or .xlsx file
    #[command(after_help = "\
Examples:
  cvault upload report.xlsx
  cvault upload export.bin --name q3.xls")]
    Upload {
        path: PathBuf,

        /// Stored file name (default: the file's own name)
        #[arg(long)]
        name: Option<String>,

        /// Content type to record (default: from the extension)
        #[arg(long)]
        content_type: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// List your files, newest first
    List {
        #[arg(long)]
        json: bool,
    },

    /// Download a stored file unchanged
    Download {
        id: i64,

        /// Output path, or - for stdout (default: the stored file name)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Print the header and first rows of a stored spreadsheet
    Show {
        id: i64,

        /// Rows to print
        #[arg(long, default_value_t = 20)]
        rows: usize,

        #[arg(long)]
        json: bool,
    },

    /// Apply one edit to a stored spreadsheet
    #[command(after_help = "\
Row 0 is the first row below the header.

Examples:
  cvault modify 3 add-column status pending
  cvault modify 3 update-cell qty 1 42
  cvault modify 3 delete-column notes
  cvault modify 3 --request '{\"kind\":\"delete_column\",\"column_name\":\"notes\"}'
  cat edit.json | cvault modify 3 --request -")]
    Modify {
        id: i64,

        /// Edit as JSON (kind, column_name, row_index, new_value), or - for stdin
        #[arg(long, value_name = "JSON")]
        request: Option<String>,

        #[arg(long)]
        json: bool,

        #[command(subcommand)]
        edit: Option<EditCommands>,
    },
}

#[derive(Subcommand)]
enum EditCommands {
    /// Append a column with the same value in every row
    AddColumn {
        column: String,
        #[arg(allow_hyphen_values = true)]
        value: String,
    },

    /// Set a single cell
    UpdateCell {
        column: String,
        #[arg(allow_hyphen_values = true)]
        row: String,
        #[arg(allow_hyphen_values = true)]
        value: String,
    },

    /// Remove a column
    DeleteColumn { column: String },
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    fn not_logged_in() -> Self {
        Self {
            code: EXIT_UNAUTHORIZED,
            message: "Not logged in.".into(),
            hint: Some("run `cvault login <username>` or set CELLVAULT_TOKEN".into()),
        }
    }
}

impl From<ServiceError> for CliError {
    fn from(e: ServiceError) -> Self {
        let code = exit_code_for(e.kind());
        let hint = (code == EXIT_UNAUTHORIZED)
            .then(|| "log in again with `cvault login <username>`".to_string());
        Self { code, message: e.to_string(), hint }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match cli.config.as_deref() {
        Some(path) => Settings::load_file(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(EXIT_USAGE);
        }
    };
    init_logging(cli.verbose, &settings);

    match run(cli, &settings) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

/// Library crates log through `log`; the fmt subscriber picks those
/// records up and writes them to stderr.
fn init_logging(verbose: u8, settings: &Settings) {
    let level = match verbose {
        0 => settings.log_filter().unwrap_or("warn"),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}

fn run(cli: Cli, settings: &Settings) -> Result<(), CliError> {
    let token = cli.token;
    match cli.command {
        Commands::Register { username, email, password } => {
            cmd_register(settings, &username, &email, password)
        }
        Commands::Login { username, password } => cmd_login(settings, &username, password),
        Commands::Logout => cmd_logout(settings, token),
        Commands::Whoami => {
            let identity = backend::open_identity(settings)?;
            let me = authenticate(&identity, token)?;
            println!("{}", me.username);
            Ok(())
        }
        Commands::Upload { path, name, content_type, json } => {
            cmd_upload(settings, token, &path, name, content_type, json)
        }
        Commands::List { json } => cmd_list(settings, token, json),
        Commands::Download { id, output } => cmd_download(settings, token, id, output),
        Commands::Show { id, rows, json } => cmd_show(settings, token, id, rows, json),
        Commands::Modify { id, request, json, edit } => {
            let request = modify_request(request, edit)?;
            cmd_modify(settings, token, id, &request, json)
        }
    }
}

// ============================================================================
// Accounts
// ============================================================================

fn cmd_register(
    settings: &Settings,
    username: &str,
    email: &str,
    password: Option<String>,
) -> Result<(), CliError> {
    let password = read_password(password)?;
    let identity = backend::open_identity(settings)?;
    let user = identity
        .register(username, email, &password)
        .map_err(ServiceError::from)?;
    println!("Registered '{}'", user.username);
    Ok(())
}

fn cmd_login(settings: &Settings, username: &str, password: Option<String>) -> Result<(), CliError> {
    let password = read_password(password)?;
    let identity = backend::open_identity(settings)?;
    let token = identity.login(username, &password).map_err(ServiceError::from)?;

    let saved = auth::SavedLogin { token, username: Some(username.to_string()) };
    let path = auth::save(&saved).map_err(CliError::general)?;
    log::debug!("token saved to {}", path.display());
    println!("Logged in as {}", username);
    Ok(())
}

/// Best effort: revocation failures are logged by the identity provider,
/// and the saved login is removed regardless.
fn cmd_logout(settings: &Settings, token: Option<String>) -> Result<(), CliError> {
    match resolve_token(token) {
        Ok(token) => {
            let identity = backend::open_identity(settings)?;
            identity.logout(&token);
        }
        Err(_) => log::info!("no token to revoke"),
    }
    if let Err(e) = auth::delete() {
        log::warn!("{}", e);
    }
    println!("Logged out");
    Ok(())
}

/// `--token` / CELLVAULT_TOKEN first, then the saved login.
fn resolve_token(flag: Option<String>) -> Result<String, CliError> {
    if let Some(token) = flag.filter(|t| !t.trim().is_empty()) {
        return Ok(token.trim().to_string());
    }
    auth::load().map(|login| login.token).ok_or_else(CliError::not_logged_in)
}

fn authenticate(identity: &SqliteIdentity, token: Option<String>) -> Result<Identity, CliError> {
    let token = resolve_token(token)?;
    Ok(identity.authenticate(&token).map_err(ServiceError::from)?)
}

fn read_password(flag: Option<String>) -> Result<String, CliError> {
    if let Some(password) = flag {
        return Ok(password);
    }
    eprint!("Password: ");
    let _ = io::stderr().flush();
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| CliError::usage(format!("cannot read password: {}", e)))?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        return Err(CliError::usage("no password given (use --password or stdin)"));
    }
    Ok(password)
}

// ============================================================================
// Files
// ============================================================================

/// Open the backends and authenticate the caller.
fn session(settings: &Settings, token: Option<String>) -> Result<(backend::Backends, Identity), CliError> {
    let backends = backend::open(settings)?;
    let me = authenticate(&backends.identity, token)?;
    Ok((backends, me))
}

fn cmd_upload(
    settings: &Settings,
    token: Option<String>,
    path: &Path,
    name: Option<String>,
    content_type: Option<String>,
    json: bool,
) -> Result<(), CliError> {
    let bytes = std::fs::read(path)
        .map_err(|e| CliError::usage(format!("cannot read {}: {}", path.display(), e)))?;
    let name = match name {
        Some(name) => name,
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| CliError::usage(format!("{} has no file name", path.display())))?,
    };

    let (backends, me) = session(settings, token)?;
    let file = backends
        .service
        .upload(&me, &name, content_type.as_deref(), &bytes)?;

    if json {
        print_json(&file)?;
    } else {
        println!("Uploaded '{}' as file {} ({})", file.file_name, file.id, file.storage_key);
    }
    Ok(())
}

fn cmd_list(settings: &Settings, token: Option<String>, json: bool) -> Result<(), CliError> {
    let (backends, me) = session(settings, token)?;
    let files = backends.service.list(&me)?;

    if json {
        return print_json(&files);
    }
    if files.is_empty() {
        println!("No files.");
        return Ok(());
    }
    let headers = ["ID", "NAME", "FORMAT", "UPLOADED"].map(String::from).to_vec();
    let rows: Vec<Vec<String>> = files.iter().map(summary_row).collect();
    print!("{}", output::render_table(&headers, &rows));
    Ok(())
}

fn summary_row(file: &FileSummary) -> Vec<String> {
    let format = Path::new(&file.file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    vec![
        file.id.to_string(),
        file.file_name.clone(),
        format,
        file.upload_date.format("%Y-%m-%d %H:%M:%S").to_string(),
    ]
}

fn cmd_download(
    settings: &Settings,
    token: Option<String>,
    id: i64,
    output: Option<PathBuf>,
) -> Result<(), CliError> {
    let (backends, me) = session(settings, token)?;
    let download = backends.service.download(&me, id)?;

    let target = output.unwrap_or_else(|| PathBuf::from(&download.file_name));
    if target.as_os_str() == "-" {
        io::stdout()
            .lock()
            .write_all(&download.bytes)
            .map_err(|e| CliError::general(format!("cannot write to stdout: {}", e)))?;
        return Ok(());
    }

    std::fs::write(&target, &download.bytes)
        .map_err(|e| CliError::general(format!("cannot write {}: {}", target.display(), e)))?;
    eprintln!(
        "Saved '{}' to {} ({} bytes)",
        download.file_name,
        target.display(),
        download.bytes.len()
    );
    Ok(())
}

fn cmd_show(
    settings: &Settings,
    token: Option<String>,
    id: i64,
    rows: usize,
    json: bool,
) -> Result<(), CliError> {
    let (backends, me) = session(settings, token)?;
    let preview = backends.service.inspect(&me, id, rows)?;

    if json {
        return print_json(&preview);
    }
    let cells: Vec<Vec<String>> = preview
        .rows
        .iter()
        .map(|row| row.iter().map(CellValue::to_string).collect())
        .collect();
    print!("{}", output::render_table(&preview.columns, &cells));
    println!("({} of {} rows)", preview.rows.len(), preview.row_count);
    Ok(())
}

fn cmd_modify(
    settings: &Settings,
    token: Option<String>,
    id: i64,
    request: &MutationRequest,
    json: bool,
) -> Result<(), CliError> {
    let (backends, me) = session(settings, token)?;
    let outcome = backends.service.modify(&me, id, request)?;

    if json {
        print_json(&outcome)
    } else {
        println!("{}", outcome.message);
        Ok(())
    }
}

/// Exactly one of `--request` or an edit subcommand.
fn modify_request(
    request: Option<String>,
    edit: Option<EditCommands>,
) -> Result<MutationRequest, CliError> {
    match (request, edit) {
        (Some(_), Some(_)) => Err(CliError::usage("use either --request or an edit subcommand, not both")),
        (None, None) => Err(CliError::usage(
            "nothing to do: give an edit subcommand (add-column, update-cell, delete-column) or --request",
        )),
        (Some(raw), None) => {
            let raw = if raw == "-" {
                let mut buf = String::new();
                io::stdin()
                    .read_to_string(&mut buf)
                    .map_err(|e| CliError::usage(format!("cannot read request from stdin: {}", e)))?;
                buf
            } else {
                raw
            };
            serde_json::from_str(&raw).map_err(|e| CliError {
                code: EXIT_INVALID_REQUEST,
                message: format!("request is not valid JSON: {}", e),
                hint: None,
            })
        }
        (None, Some(edit)) => Ok(edit_request(edit)),
    }
}

fn edit_request(edit: EditCommands) -> MutationRequest {
    match edit {
        EditCommands::AddColumn { column, value } => {
            MutationRequest::add_column(&column, input_value(&value))
        }
        // Row stays text so the engine reports non-integers
        EditCommands::UpdateCell { column, row, value } => MutationRequest {
            kind: Some("update_cell".into()),
            column_name: Some(column),
            row_index: Some(serde_json::Value::String(row)),
            new_value: Some(input_value(&value)),
        },
        EditCommands::DeleteColumn { column } => MutationRequest::delete_column(&column),
    }
}

/// Typed JSON for a command-line value: numbers and TRUE/FALSE keep their
/// type, an empty argument clears the cell.
fn input_value(raw: &str) -> serde_json::Value {
    match CellValue::from_input(raw) {
        CellValue::Empty => serde_json::Value::String(String::new()),
        value => serde_json::to_value(value)
            .unwrap_or_else(|_| serde_json::Value::String(raw.to_string())),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::general(format!("cannot serialize output: {}", e)))?;
    println!("{}", text);
    Ok(())
}
