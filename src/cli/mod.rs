//! CLI module for the staffdir command-line interface.
//!
//! Drives the directory controller against a running record store:
//! - `whoami` - Show the operator behind the token
//! - `departments` - List department names
//! - `list` - Search, filter, paginate and export employees
//! - `show` / `add` / `update` - Read and write single records
//! - `delete` / `restore` - Soft-delete and reactivate
//! - `upload` - Upload a photo and print its URL
//! - `config check` - Validate configuration file

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::Config;
use crate::directory::{
    Confirm, Directory, ExportFormat, PrintSurface, PrintWindow, UploadCoordinator,
};
use crate::error::DirectoryError;
use crate::models::{
    EmployeeRecord, EmployeeStatus, FormDraft, SortField, SortOrder, UploadFile,
};
use crate::store::{HttpRepository, RecordRepository, Session};

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "staffdir")]
#[command(author, version, about = "Employee directory client for a remote record store", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "staffdir.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Record store URL (overrides server.base_url)
    #[arg(long, env = "STAFFDIR_API_URL")]
    pub api_url: Option<String>,

    /// Bearer token (can also be set via STAFFDIR_TOKEN env var)
    #[arg(long, env = "STAFFDIR_TOKEN")]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the signed-in operator
    Whoami,

    /// List department names
    Departments,

    /// List employees, optionally exporting the page
    List(ListArgs),

    /// Show a single employee
    Show {
        /// Employee ID
        id: String,
    },

    /// Add an employee
    Add {
        #[command(flatten)]
        fields: DraftArgs,
        /// Photo to upload and attach
        #[arg(long)]
        photo: Option<PathBuf>,
    },

    /// Update an employee; omitted fields keep their current value
    Update {
        /// Employee ID
        id: String,
        #[command(flatten)]
        fields: DraftArgs,
        /// Photo to upload and attach
        #[arg(long)]
        photo: Option<PathBuf>,
    },

    /// Mark an employee inactive
    Delete {
        /// Employee ID
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Mark an employee active again
    Restore {
        /// Employee ID
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Upload a file and print its URL
    Upload {
        file: PathBuf,
    },

    /// Configuration management commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate configuration file
    Check,
}

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// Search name, email or code
    #[arg(short, long)]
    pub search: Option<String>,
    #[arg(short, long)]
    pub department: Option<String>,
    /// active or inactive
    #[arg(long)]
    pub status: Option<EmployeeStatus>,
    #[arg(short, long)]
    pub page: Option<u32>,
    /// Rows per page (default: list.page_size)
    #[arg(short = 'n', long)]
    pub limit: Option<u32>,
    #[arg(long, value_enum)]
    pub sort_by: Option<SortField>,
    #[arg(long, value_enum)]
    pub sort_order: Option<SortOrder>,
    /// Export the listed page
    #[arg(long, value_enum)]
    pub export: Option<ExportFormat>,
    /// Directory for exported files (default: export.output_dir)
    #[arg(long)]
    pub out: Option<PathBuf>,
}

/// Editable employee fields
#[derive(Args, Debug, Default)]
pub struct DraftArgs {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub department: Option<String>,
    #[arg(long)]
    pub role: Option<String>,
    #[arg(long)]
    pub salary: Option<f64>,
    /// YYYY-MM-DD
    #[arg(long)]
    pub join_date: Option<NaiveDate>,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub address: Option<String>,
}

impl DraftArgs {
    fn apply(&self, draft: &mut FormDraft) {
        if let Some(name) = &self.name {
            draft.name = name.clone();
        }
        if let Some(email) = &self.email {
            draft.email = email.clone();
        }
        if let Some(department) = &self.department {
            draft.department = department.clone();
        }
        if let Some(role) = &self.role {
            draft.role = role.clone();
        }
        if self.salary.is_some() {
            draft.salary = self.salary;
        }
        if self.join_date.is_some() {
            draft.join_date = self.join_date;
        }
        if let Some(phone) = &self.phone {
            draft.phone = phone.clone();
        }
        if let Some(address) = &self.address {
            draft.address = address.clone();
        }
    }
}

// ============================================================================
// Front-end collaborators
// ============================================================================

/// Asks on stdin; anything but `y`/`yes` declines.
struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        print!("{} [y/N] ", prompt);
        if std::io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        match std::io::stdin().lock().read_line(&mut answer) {
            Ok(_) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
            Err(_) => false,
        }
    }
}

fn always_yes(_prompt: &str) -> bool {
    true
}

/// Print surface that writes the printable page into a directory.
pub struct FilePrintSurface {
    dir: PathBuf,
    printed: Mutex<Option<PathBuf>>,
}

impl FilePrintSurface {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            printed: Mutex::new(None),
        }
    }

    /// Path of the last document handed to `print`.
    pub fn printed(&self) -> Option<PathBuf> {
        self.printed.lock().clone()
    }
}

struct FileWindow<'a> {
    surface: &'a FilePrintSurface,
    path: PathBuf,
    writer: BufWriter<File>,
}

impl PrintWindow for FileWindow<'_> {
    fn write_document(&mut self, html: &str) -> std::io::Result<()> {
        self.writer.write_all(html.as_bytes())
    }

    fn print(&mut self) -> std::io::Result<()> {
        self.writer.flush()?;
        *self.surface.printed.lock() = Some(self.path.clone());
        Ok(())
    }
}

impl PrintSurface for FilePrintSurface {
    fn open_window(&self, title: &str) -> Option<Box<dyn PrintWindow + '_>> {
        let path = self.dir.join(format!("{}.html", slug(title)));
        match File::create(&path) {
            Ok(file) => Some(Box::new(FileWindow {
                surface: self,
                path,
                writer: BufWriter::new(file),
            })),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot open print document");
                None
            }
        }
    }
}

/// `"Employees - Page 2"` -> `"employees_page_2"`
fn slug(title: &str) -> String {
    title
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

// ============================================================================
// CLI Command Handlers
// ============================================================================

struct Connection {
    config: Config,
    repo: HttpRepository,
    session: Session,
}

fn connect(cli: &Cli, config: Config) -> Result<Connection> {
    let base_url = cli
        .api_url
        .clone()
        .unwrap_or_else(|| config.server.base_url.clone());
    let token = match &cli.token {
        Some(token) => Some(token.clone()),
        None => config.resolve_token()?,
    };
    let repo = HttpRepository::new(&base_url, config.timeout())?;
    debug!(base_url = %base_url, authenticated = token.is_some(), "Connecting to record store");
    Ok(Connection {
        config,
        repo,
        session: Session::new(token),
    })
}

impl Connection {
    fn directory(self) -> Directory<HttpRepository> {
        let options = self.config.directory_options();
        Directory::new(self.repo, self.session, options)
    }
}

/// Prefer the message the controller put on screen.
fn inline_error<R: RecordRepository>(dir: &Directory<R>, err: DirectoryError) -> anyhow::Error {
    match err {
        DirectoryError::MissingCredential => anyhow!(
            "Not signed in. Use --token, set STAFFDIR_TOKEN, or configure auth.token."
        ),
        err => anyhow!(dir.error().unwrap_or_else(|| err.to_string())),
    }
}

fn store_error(err: DirectoryError) -> anyhow::Error {
    match err {
        DirectoryError::MissingCredential => anyhow!(
            "Not signed in. Use --token, set STAFFDIR_TOKEN, or configure auth.token."
        ),
        err => anyhow!(err.describe()),
    }
}

/// Run a CLI command
pub async fn run_command(cli: &Cli, config: Result<Config>) -> Result<()> {
    if let Commands::Config(ConfigCommands::Check) = &cli.command {
        return cmd_config_check(cli, config);
    }
    let config = config?;
    config.validate()?;
    let conn = connect(cli, config)?;

    match &cli.command {
        Commands::Whoami => cmd_whoami(conn).await,
        Commands::Departments => cmd_departments(conn).await,
        Commands::List(args) => cmd_list(conn, args).await,
        Commands::Show { id } => cmd_show(conn, id).await,
        Commands::Add { fields, photo } => cmd_add(conn, fields, photo.as_deref()).await,
        Commands::Update { id, fields, photo } => {
            cmd_update(conn, id, fields, photo.as_deref()).await
        }
        Commands::Delete { id, yes } => cmd_delete(conn, id, *yes).await,
        Commands::Restore { id, yes } => cmd_restore(conn, id, *yes).await,
        Commands::Upload { file } => cmd_upload(conn, file).await,
        Commands::Config(ConfigCommands::Check) => Ok(()),
    }
}

async fn cmd_whoami(conn: Connection) -> Result<()> {
    let user = conn
        .repo
        .current_user(&conn.session)
        .await
        .map_err(store_error)?;
    println!("Username:   {}", user.username);
    println!("Role:       {}", user.role);
    println!("ID:         {}", user.id);
    if let Some(status) = &user.status {
        println!("Status:     {}", status);
    }
    if let Some(last_login) = &user.last_login {
        println!("Last login: {}", last_login);
    }
    Ok(())
}

async fn cmd_departments(conn: Connection) -> Result<()> {
    let departments = conn
        .repo
        .departments(&conn.session)
        .await
        .map_err(store_error)?;
    if departments.is_empty() {
        println!("No departments found.");
    }
    for department in departments {
        println!("{}", department);
    }
    Ok(())
}

async fn cmd_list(conn: Connection, args: &ListArgs) -> Result<()> {
    let mut options = conn.config.directory_options();
    let criteria = &mut options.criteria;
    if let Some(search) = &args.search {
        criteria.search_text = search.clone();
    }
    if let Some(department) = &args.department {
        criteria.department = department.clone();
    }
    criteria.status = args.status;
    if let Some(limit) = args.limit {
        if limit == 0 {
            anyhow::bail!("--limit must be at least 1");
        }
        criteria.page_size = limit;
    }
    if let Some(sort_by) = args.sort_by {
        criteria.sort_by = sort_by;
    }
    if let Some(sort_order) = args.sort_order {
        criteria.sort_order = sort_order;
    }
    let out_dir = args
        .out
        .clone()
        .unwrap_or_else(|| conn.config.export.output_dir.clone());
    let dir = Directory::new(conn.repo, conn.session, options);

    dir.refresh().await.map_err(|e| inline_error(&dir, e))?;
    // The page is checked against the total, so it goes after the first fetch.
    if let Some(page) = args.page {
        dir.set_page(page).await.map_err(|e| inline_error(&dir, e))?;
    }

    let view = dir.view();
    if view.rows.is_empty() {
        println!("No employees found.");
    } else {
        print_table(&view.rows);
    }
    println!();
    println!("{}", view.summary());

    if let Some(format) = args.export {
        std::fs::create_dir_all(&out_dir)
            .with_context(|| format!("Failed to create output directory: {}", out_dir.display()))?;
        export_page(&dir, format, &out_dir)?;
    }
    Ok(())
}

fn export_page<R: RecordRepository>(dir: &Directory<R>, format: ExportFormat, out_dir: &Path) -> Result<()> {
    if format == ExportFormat::Print {
        let surface = FilePrintSurface::new(out_dir);
        let printed = dir.print(&surface).map_err(|e| inline_error(dir, e))?;
        match surface.printed() {
            Some(path) if printed => println!("[OK] Printable page written to {}", path.display()),
            _ => println!("Nothing to export."),
        }
        return Ok(());
    }

    match dir.export(format) {
        Some(artifact) => {
            let path = out_dir.join(&artifact.file_name);
            std::fs::write(&path, artifact.content.as_bytes())
                .with_context(|| format!("Failed to write export: {}", path.display()))?;
            println!("[OK] Exported {} ({})", path.display(), artifact.mime);
        }
        None => println!("Nothing to export."),
    }
    Ok(())
}

fn print_table(rows: &[EmployeeRecord]) {
    println!();
    println!(
        "{:<36}  {:<9}  {:<20}  {:<26}  {:<14}  {:<14}  {:>10}  {:<8}",
        "ID", "CODE", "NAME", "EMAIL", "DEPARTMENT", "ROLE", "SALARY", "STATUS"
    );
    println!("{}", "-".repeat(152));
    for row in rows {
        println!(
            "{:<36}  {:<9}  {:<20}  {:<26}  {:<14}  {:<14}  {:>10}  {:<8}",
            row.id,
            truncate(&row.emp_code, 9),
            truncate(&row.name, 20),
            truncate(&row.email, 26),
            truncate(&row.department, 14),
            truncate(&row.role, 14),
            row.salary,
            row.status
        );
    }
}

fn print_record(record: &EmployeeRecord) {
    println!("ID:          {}", record.id);
    println!("Code:        {}", record.emp_code);
    println!("Name:        {}", record.name);
    println!("Email:       {}", record.email);
    println!("Department:  {}", record.department);
    println!("Role:        {}", record.role);
    println!("Salary:      {}", record.salary);
    println!("Joined:      {}", record.join_date);
    println!("Phone:       {}", if record.phone.is_empty() { "-" } else { &record.phone });
    println!("Address:     {}", record.address.as_deref().unwrap_or("-"));
    println!("Photo:       {}", record.photo.as_deref().unwrap_or("-"));
    println!("Status:      {}", record.status);
}

async fn cmd_show(conn: Connection, id: &str) -> Result<()> {
    let record = conn.repo.get(&conn.session, id).await.map_err(store_error)?;
    print_record(&record);
    Ok(())
}

fn read_upload(path: &Path) -> Result<UploadFile> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("Not a file: {}", path.display()))?;
    Ok(UploadFile::new(file_name, bytes))
}

async fn attach_photo<R: RecordRepository>(dir: &Directory<R>, photo: Option<&Path>) -> Result<()> {
    if let Some(path) = photo {
        let file = read_upload(path)?;
        let url = dir
            .select_photo(file)
            .await
            .map_err(|e| inline_error(dir, e))?;
        println!("Uploaded photo: {}", url);
    }
    Ok(())
}

async fn cmd_add(conn: Connection, fields: &DraftArgs, photo: Option<&Path>) -> Result<()> {
    let dir = conn.directory();
    dir.open_add_form();
    dir.edit_draft(|draft| fields.apply(draft))?;
    attach_photo(&dir, photo).await?;
    let record = dir.add().await.map_err(|e| inline_error(&dir, e))?;
    println!("[OK] Added {} ({})", record.name, record.emp_code);
    println!();
    print_record(&record);
    Ok(())
}

async fn cmd_update(conn: Connection, id: &str, fields: &DraftArgs, photo: Option<&Path>) -> Result<()> {
    let dir = conn.directory();
    let current = dir
        .repository()
        .get(dir.session(), id)
        .await
        .map_err(store_error)?;
    dir.open_edit_form(&current);
    dir.edit_draft(|draft| fields.apply(draft))?;
    attach_photo(&dir, photo).await?;
    let record = dir.update().await.map_err(|e| inline_error(&dir, e))?;
    println!("[OK] Updated {} ({})", record.name, record.emp_code);
    Ok(())
}

fn confirmer(yes: bool) -> Box<dyn Confirm> {
    if yes {
        Box::new(always_yes)
    } else {
        Box::new(StdinConfirm)
    }
}

async fn cmd_delete(conn: Connection, id: &str, yes: bool) -> Result<()> {
    let dir = conn.directory();
    let confirm = confirmer(yes);
    if dir
        .soft_delete(id, confirm.as_ref())
        .await
        .map_err(|e| inline_error(&dir, e))?
    {
        println!("[OK] Employee {} marked inactive", id);
    } else {
        println!("Cancelled.");
    }
    Ok(())
}

async fn cmd_restore(conn: Connection, id: &str, yes: bool) -> Result<()> {
    let dir = conn.directory();
    let confirm = confirmer(yes);
    if dir
        .restore(id, confirm.as_ref())
        .await
        .map_err(|e| inline_error(&dir, e))?
    {
        println!("[OK] Employee {} active again", id);
    } else {
        println!("Cancelled.");
    }
    Ok(())
}

async fn cmd_upload(conn: Connection, path: &Path) -> Result<()> {
    let file = read_upload(path)?;
    let url = UploadCoordinator::new()
        .upload(&conn.repo, &conn.session, file)
        .await
        .map_err(store_error)?;
    println!("{}", url);
    Ok(())
}

/// Validate configuration file
fn cmd_config_check(cli: &Cli, config: Result<Config>) -> Result<()> {
    let config_path = &cli.config;

    println!("Checking configuration file: {}", config_path.display());
    println!();

    if !config_path.exists() {
        println!(
            "[!!] Configuration file not found: {}",
            config_path.display()
        );
        println!();
        println!("Defaults will be used (record store at http://localhost:8000).");
    }

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            println!("[!!] Configuration file is invalid:");
            println!("     {:#}", e);
            anyhow::bail!("Configuration check failed");
        }
    };
    if let Err(e) = config.validate() {
        println!("[!!] {:#}", e);
        anyhow::bail!("Configuration check failed");
    }

    println!("[OK] Configuration is valid!");
    println!();
    println!("=== Configuration Summary ===");
    println!();
    println!("Server:");
    println!("  Base URL:     {}", cli.api_url.as_deref().unwrap_or(&config.server.base_url));
    println!("  Timeout:      {}s", config.server.timeout_secs);
    println!();
    println!("List:");
    println!("  Page Size:    {}", config.list.page_size);
    println!(
        "  Sort:         {} {}",
        config.list.sort_by.as_str(),
        config.list.sort_order.as_str()
    );
    println!("  Debounce:     {}ms", config.list.search_debounce_ms);
    println!();
    println!("Export:");
    println!("  Output Dir:   {}", config.export.output_dir.display());
    println!();

    let mut warnings = Vec::new();
    match (&cli.token, config.resolve_token()) {
        (Some(_), _) | (None, Ok(Some(_))) => {}
        (None, Ok(None)) => warnings.push("No bearer token configured; store calls will fail".to_string()),
        (None, Err(e)) => warnings.push(format!("{:#}", e)),
    }
    if config.server.base_url.starts_with("http://")
        && !config.server.base_url.contains("localhost")
        && !config.server.base_url.contains("127.0.0.1")
    {
        warnings.push("Record store is not served over HTTPS".to_string());
    }

    if warnings.is_empty() {
        println!("No warnings.");
    } else {
        println!("Warnings:");
        for warning in warnings {
            println!("  [!!] {}", warning);
        }
    }
    Ok(())
}

/// Truncate a string to max length with ellipsis
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug() {
        assert_eq!(slug("Employees - Page 2"), "employees_page_2");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long name", 10), "a very ...");
        assert_eq!(truncate("ééééééééééé", 5), "éé...");
    }

    #[test]
    fn test_draft_args_only_override_given_fields() {
        let mut draft = FormDraft {
            name: "Ann".to_string(),
            role: "Dev".to_string(),
            salary: Some(10.0),
            ..Default::default()
        };
        let args = DraftArgs {
            role: Some("Lead".to_string()),
            salary: Some(20.0),
            ..Default::default()
        };
        args.apply(&mut draft);
        assert_eq!(draft.name, "Ann");
        assert_eq!(draft.role, "Lead");
        assert_eq!(draft.salary, Some(20.0));
    }

    #[test]
    fn test_parse_list_command() {
        let cli = Cli::try_parse_from([
            "staffdir",
            "list",
            "--status",
            "inactive",
            "--sort-by",
            "join-date",
            "--export",
            "excel",
        ])
        .unwrap();
        match cli.command {
            Commands::List(args) => {
                assert_eq!(args.status, Some(EmployeeStatus::Inactive));
                assert_eq!(args.sort_by, Some(SortField::JoinDate));
                assert_eq!(args.export, Some(ExportFormat::Excel));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_add_command() {
        let cli = Cli::try_parse_from([
            "staffdir",
            "add",
            "--name",
            "Ann",
            "--salary",
            "1200.5",
            "--join-date",
            "2024-05-01",
        ])
        .unwrap();
        match cli.command {
            Commands::Add { fields, photo } => {
                assert_eq!(fields.salary, Some(1200.5));
                assert_eq!(fields.join_date, NaiveDate::from_ymd_opt(2024, 5, 1));
                assert!(photo.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_file_print_surface_writes_document() {
        let dir = std::env::temp_dir().join(format!("staffdir-print-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let surface = FilePrintSurface::new(&dir);
        {
            let mut window = surface.open_window("Employees - Page 1").unwrap();
            window.write_document("<html></html>").unwrap();
            window.print().unwrap();
        }
        let path = surface.printed().unwrap();
        assert_eq!(path, dir.join("employees_page_1.html"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<html></html>");
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_file_print_surface_refuses_missing_dir() {
        let surface = FilePrintSurface::new("/nonexistent/staffdir/print");
        assert!(surface.open_window("Employees - Page 1").is_none());
    }
}
