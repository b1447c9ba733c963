//! moodle2pdf - Moodle course editor and PDF exporter for your terminal.
//!
//! Without a subcommand the interactive editor starts. Every operation of
//! the editor is also available as a subcommand for scripting.

use std::fs::OpenOptions;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use url::Url;

use moodle2pdf::core::{Config, Locale, Message, Translator};
use moodle2pdf::export::{
    open_in_viewer, with_pdf_extension, ExportError, ExportItem, ExportJob, ExportKind, ExportMode,
    PdfSettings,
};
use moodle2pdf::moodle::{parse_course_link, parse_site_url, MoodleApi, MoodleClient, Session};
use moodle2pdf::security::{CredentialStore, Credentials};
use moodle2pdf::{tui, App};

/// Export Moodle glossaries, wikis and databases to PDF
#[derive(Parser)]
#[command(name = "moodle2pdf")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of the default lookup
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
}

/// Site and login options shared by all commands that talk to Moodle.
#[derive(Args, Debug, Clone)]
struct LoginArgs {
    /// Moodle site URL (defaults to moodle.url from the config)
    #[arg(long, env = "MOODLE2PDF_SITE")]
    site: Option<String>,

    /// Moodle username (prompted for when missing)
    #[arg(short, long, env = "MOODLE2PDF_USER")]
    username: Option<String>,

    /// Moodle password (keychain or prompt when missing)
    #[arg(short, long, env = "MOODLE2PDF_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive editor (default)
    Tui,

    /// Export glossaries, wikis and databases of a course to PDF
    Export {
        /// Course link, e.g. https://moodle.example.org/course/view.php?id=42
        #[arg(long, conflicts_with = "id", required_unless_present = "id")]
        link: Option<String>,

        /// Course id on the site given by --site
        #[arg(long)]
        id: Option<u64>,

        #[command(flatten)]
        login: LoginArgs,

        /// Output file (defaults to pdf.default_output_filename)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write one file per activity
        #[arg(long)]
        apart: bool,

        /// Open the PDF in the system viewer when done
        #[arg(long)]
        open: bool,

        /// Skip glossaries
        #[arg(long)]
        no_glossary: bool,

        /// Skip wikis
        #[arg(long)]
        no_wiki: bool,

        /// Skip databases
        #[arg(long)]
        no_database: bool,
    },

    /// List the courses of the user
    Courses {
        #[command(flatten)]
        login: LoginArgs,
    },

    /// List sections and modules of a course with their visibility
    Contents {
        /// Course id
        #[arg(long)]
        id: u64,

        #[command(flatten)]
        login: LoginArgs,
    },

    /// Show or hide a course module
    Visibility {
        /// Course module id
        #[arg(long)]
        module: u64,

        /// Make the module visible
        #[arg(long, conflicts_with = "hide", required_unless_present = "hide")]
        show: bool,

        /// Hide the module
        #[arg(long)]
        hide: bool,

        #[command(flatten)]
        login: LoginArgs,
    },

    /// Check credentials and optionally remember the password
    Login {
        /// Store the password in the system keychain
        #[arg(long)]
        remember: bool,

        #[command(flatten)]
        login: LoginArgs,
    },

    /// Remove a remembered password from the system keychain
    Logout {
        #[command(flatten)]
        login: LoginArgs,
    },

    /// Show configuration
    Config {
        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load()?,
    };

    // The editor owns the terminal, so it logs to a file.
    let tui_mode = matches!(cli.command, None | Some(Commands::Tui));
    init_logging(cli.verbose, tui_mode.then(|| Path::new(&config.system.log_filename)))?;

    let tr = Translator::new(Locale::from_setting(&config.ui.language));

    match cli.command {
        None | Some(Commands::Tui) => cmd_tui(config)?,
        Some(Commands::Export {
            link,
            id,
            login,
            output,
            apart,
            open,
            no_glossary,
            no_wiki,
            no_database,
        }) => {
            let kinds = [
                (ExportKind::Glossary, !no_glossary),
                (ExportKind::Wiki, !no_wiki),
                (ExportKind::Database, !no_database),
            ]
            .into_iter()
            .filter_map(|(kind, enabled)| enabled.then_some(kind))
            .collect::<Vec<_>>();
            let target = ExportTarget { link, id, output, apart, open, kinds };
            cmd_export(&config, &tr, &login, target)?;
        }
        Some(Commands::Courses { login }) => cmd_courses(&config, &tr, &login)?,
        Some(Commands::Contents { id, login }) => cmd_contents(&config, &tr, &login, id)?,
        Some(Commands::Visibility { module, show, hide: _, login }) => {
            cmd_visibility(&config, &tr, &login, module, show)?;
        }
        Some(Commands::Login { remember, login }) => cmd_login(&config, &tr, &login, remember)?,
        Some(Commands::Logout { login }) => cmd_logout(&config, &tr, &login)?,
        Some(Commands::Config { path }) => cmd_config(&config, path)?,
        Some(Commands::Completions { shell }) => cmd_completions(shell),
    }

    Ok(())
}

/// Install the tracing subscriber. With `log_file` set, output goes there
/// instead of stderr.
fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = if verbose { EnvFilter::new("debug") } else { EnvFilter::new("warn") };

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let filter = if verbose { filter } else { EnvFilter::new("info") };
            tracing_subscriber::registry()
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .with(filter)
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(false).with_writer(io::stderr))
                .with(filter)
                .init();
        }
    }
    Ok(())
}

/// Run the interactive editor.
fn cmd_tui(config: Config) -> Result<()> {
    let client = MoodleClient::new(&config.moodle)?;
    let app = App::new(config, Arc::new(client));
    tui::run_tui(app)
}

/// Course and output options of `export`.
struct ExportTarget {
    link: Option<String>,
    id: Option<u64>,
    output: Option<PathBuf>,
    apart: bool,
    open: bool,
    kinds: Vec<ExportKind>,
}

/// Export all activities of the selected kinds from one course.
fn cmd_export(config: &Config, tr: &Translator, login: &LoginArgs, target: ExportTarget) -> Result<()> {
    if target.apart {
        return Err(ExportError::NotImplemented.into());
    }
    if target.kinds.is_empty() {
        return Err(ExportError::NoSelection.into());
    }

    let (site, course_id) = match (&target.link, target.id) {
        (Some(link), _) => parse_course_link(link)?,
        (None, Some(id)) => (site_url(config, login)?, id),
        (None, None) => anyhow::bail!("Either --link or --id is required"),
    };

    let (client, session) = connect(config, tr, &site, login)?;

    let mut items = Vec::new();
    for kind in &target.kinds {
        match kind {
            ExportKind::Glossary => items.extend(
                client
                    .glossaries(&session, course_id)?
                    .into_iter()
                    .map(|g| ExportItem::new(ExportKind::Glossary, g.id, g.name)),
            ),
            ExportKind::Wiki => items.extend(
                client
                    .wikis(&session, course_id)?
                    .into_iter()
                    .map(|w| ExportItem::new(ExportKind::Wiki, w.id, w.name)),
            ),
            ExportKind::Database => items.extend(
                client
                    .databases(&session, course_id)?
                    .into_iter()
                    .map(|d| ExportItem::new(ExportKind::Database, d.id, d.name)),
            ),
        }
    }

    let output = with_pdf_extension(
        target.output.unwrap_or_else(|| PathBuf::from(&config.pdf.default_output_filename)),
    );
    let job = ExportJob::new(items, ExportMode::Combined, output);

    eprintln!("{}", tr.tr(Message::BuildingPdf));
    let summary = job.run(&client, &session, &PdfSettings::from_config(&config.pdf), |done, overall| {
        eprint!("\r{done}/{overall}");
        let _ = io::stderr().flush();
    })?;
    eprintln!();

    println!("{} {}", tr.tr(Message::FinishedPdf), summary.path.display());
    if target.open {
        open_in_viewer(&summary.path)
            .with_context(|| format!("Could not open {}", summary.path.display()))?;
    }
    Ok(())
}

/// List the user's courses.
fn cmd_courses(config: &Config, tr: &Translator, login: &LoginArgs) -> Result<()> {
    let site = site_url(config, login)?;
    let (client, session) = connect(config, tr, &site, login)?;

    for course in client.courses(&session)? {
        println!("{:>6}  {}", course.id, course.fullname);
    }
    Ok(())
}

/// List sections and modules of one course.
fn cmd_contents(config: &Config, tr: &Translator, login: &LoginArgs, course_id: u64) -> Result<()> {
    let site = site_url(config, login)?;
    let (client, session) = connect(config, tr, &site, login)?;

    let visibility = |visible: bool| if visible { tr.tr(Message::Shown) } else { tr.tr(Message::Hidden) };

    for section in client.course_contents(&session, course_id)? {
        println!("{} ({})", section.name, visibility(section.all_modules_visible()));
        for module in &section.modules {
            println!(
                "  {:>6}  {:<10} {} ({})",
                module.id,
                module.modname,
                module.name,
                visibility(module.visible)
            );
        }
    }
    Ok(())
}

/// Show or hide one course module.
fn cmd_visibility(
    config: &Config,
    tr: &Translator,
    login: &LoginArgs,
    module_id: u64,
    visible: bool,
) -> Result<()> {
    let site = site_url(config, login)?;
    let (client, session) = connect(config, tr, &site, login)?;

    eprintln!("{}", tr.tr(Message::ChangingModuleVisibility));
    client.set_module_visibility(&session, module_id, visible)?;
    println!("{}", tr.tr(Message::VisibilityChanged));
    Ok(())
}

/// Verify credentials and optionally store the password.
fn cmd_login(config: &Config, tr: &Translator, login: &LoginArgs, remember: bool) -> Result<()> {
    let site = site_url(config, login)?;
    let credentials = resolve_credentials(tr, &site, login)?;
    let client = MoodleClient::new(&config.moodle)?;
    let session = client
        .authenticate(&site, &credentials)
        .with_context(|| tr.tr(Message::WrongCredentials))?;

    if remember {
        CredentialStore::new().store(&site, &credentials)?;
    }
    println!("{} {} ({})", tr.tr(Message::LoggedIn), session.site_name, session.site);
    Ok(())
}

/// Forget a stored password.
fn cmd_logout(config: &Config, tr: &Translator, login: &LoginArgs) -> Result<()> {
    let site = site_url(config, login)?;
    let username = match &login.username {
        Some(username) => username.clone(),
        None => prompt_line(tr.tr(Message::UsernameLabel))?,
    };
    CredentialStore::new().delete(&site, &username)?;
    println!("{}", CredentialStore::key_for(&site, &username));
    Ok(())
}

/// Show configuration.
fn cmd_config(config: &Config, show_path: bool) -> Result<()> {
    if show_path {
        if let Some(path) = Config::config_dir() {
            println!("{}", path.display());
        }
        return Ok(());
    }

    let toml = toml::to_string_pretty(config)?;
    println!("{toml}");

    Ok(())
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "moodle2pdf", &mut io::stdout());
}

/// Site from `--site` or the config.
fn site_url(config: &Config, login: &LoginArgs) -> Result<Url> {
    let raw = login.site.as_deref().unwrap_or(&config.moodle.url);
    Ok(parse_site_url(raw)?)
}

/// Log in and return the client with its session.
fn connect(
    config: &Config,
    tr: &Translator,
    site: &Url,
    login: &LoginArgs,
) -> Result<(MoodleClient, Session)> {
    let credentials = resolve_credentials(tr, site, login)?;
    let client = MoodleClient::new(&config.moodle)?;
    eprintln!("{}", tr.tr(Message::LoggingIn));
    let session = client
        .authenticate(site, &credentials)
        .with_context(|| tr.tr(Message::WrongCredentials))?;
    Ok((client, session))
}

/// Username from the flag or a prompt; password from the flag, the keychain
/// or a masked prompt.
fn resolve_credentials(tr: &Translator, site: &Url, login: &LoginArgs) -> Result<Credentials> {
    let username = match &login.username {
        Some(username) => username.clone(),
        None => prompt_line(tr.tr(Message::UsernameLabel))?,
    };

    let password = match &login.password {
        Some(password) => password.clone(),
        None => match CredentialStore::new().retrieve(site, &username) {
            Ok(secret) => secret.expose().to_string(),
            Err(e) => {
                tracing::debug!("No stored password: {}", e);
                prompt_password(tr.tr(Message::PasswordLabel))?
            }
        },
    };

    Ok(Credentials::new(username, password))
}

fn prompt_line(prompt: &str) -> Result<String> {
    eprint!("{prompt}");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Read a password without echoing it.
fn prompt_password(prompt: &str) -> Result<String> {
    use crossterm::event::{read, Event, KeyCode, KeyEventKind, KeyModifiers};
    use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

    eprint!("{prompt}");
    io::stderr().flush()?;

    enable_raw_mode()?;
    let result = (|| -> Result<String> {
        let mut password = String::new();
        loop {
            let Event::Key(key) = read()? else { continue };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Enter => return Ok(password),
                KeyCode::Esc => anyhow::bail!("Password entry cancelled"),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    anyhow::bail!("Password entry cancelled")
                }
                KeyCode::Backspace => {
                    password.pop();
                }
                KeyCode::Char(c) => password.push(c),
                _ => {}
            }
        }
    })();
    disable_raw_mode()?;
    eprintln!();

    result
}
