//! Purpose: `fhandle` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Commands emit one JSON value on stdout (raw bytes for `cat`).
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: All filesystem mutations go through `api::FileHandle`.
#![allow(clippy::result_large_err)]
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{
    CommandFactory, Parser, Subcommand, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

mod command_dispatch;
mod handle_info_json;

use fhandle::api::{
    Error, ErrorKind, FileHandle,
    path::{join, normalize_slashes},
    to_exit_code,
};
use fhandle::notice::{Notice, notice_json};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(clap_error_summary(&err))
                        .with_hint("Try `fhandle --help`."),
                    ColorMode::Auto,
                ));
            }
        },
    };

    init_tracing(cli.verbose);
    let color_mode = cli.color;
    let root = cli.root;

    let result = command_dispatch::dispatch_command(cli.command, root.as_deref(), color_mode);

    result
        .map_err(add_kind_hint)
        .map_err(add_io_hint)
        .map_err(add_internal_hint)
        .map_err(|err| (err, color_mode))
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

#[derive(Parser)]
#[command(
    name = "fhandle",
    version,
    about = "Inspect, move, and copy files through stateful handles",
    long_about = None,
    after_help = r#"EXAMPLES
  $ fhandle stat logs/app.log --digest
  $ fhandle ls logs --sort
  $ fhandle mkdir logs archive/2024
  $ fhandle rename logs/app.log app.old.log
  $ fhandle cp logs backup/logs

Relative paths resolve against --root (default: current directory).
Set RUST_LOG=debug (or pass --verbose) to trace each filesystem call."#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        help = "Base directory for relative paths (default: current directory)",
        value_hint = ValueHint::DirPath
    )]
    root: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics: auto|always|never"
    )]
    color: ColorMode,
    #[arg(long, short, global = true, help = "Log each filesystem call to stderr")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Show cached metadata for a path")]
    Stat {
        #[arg(value_hint = ValueHint::AnyPath)]
        path: String,
        #[arg(long, help = "Include the SHA-256 of the file contents")]
        digest: bool,
    },
    #[command(about = "Write the full contents of a file to stdout")]
    Cat {
        #[arg(value_hint = ValueHint::FilePath)]
        path: String,
    },
    #[command(
        about = "List the immediate children of a directory",
        long_about = "List the immediate children of a directory.\n\nListing order is whatever the filesystem returns; pass --sort for name order."
    )]
    Ls {
        #[arg(value_hint = ValueHint::DirPath)]
        path: String,
        #[arg(long, help = "Sort children by name")]
        sort: bool,
    },
    #[command(about = "Create a (nested) subdirectory below a directory")]
    Mkdir {
        #[arg(value_hint = ValueHint::DirPath)]
        dir: String,
        #[arg(help = "Relative name, may contain nested segments")]
        name: String,
    },
    #[command(about = "Delete a file or a whole directory tree")]
    Rm {
        #[arg(value_hint = ValueHint::AnyPath)]
        path: String,
    },
    #[command(about = "Rename within the same parent directory")]
    Rename {
        #[arg(value_hint = ValueHint::AnyPath)]
        path: String,
        #[arg(help = "New leaf name (not a path)")]
        name: String,
    },
    #[command(about = "Move to another path (no cross-device fallback)")]
    Mv {
        #[arg(value_hint = ValueHint::AnyPath)]
        path: String,
        #[arg(value_hint = ValueHint::AnyPath)]
        dest: String,
    },
    #[command(
        about = "Copy a file or directory tree",
        long_about = "Copy a file or directory tree.\n\nDirectory copies are best-effort: files that cannot be copied are reported as notices on stderr and the walk continues."
    )]
    Cp {
        #[arg(value_hint = ValueHint::AnyPath)]
        src: String,
        #[arg(value_hint = ValueHint::AnyPath)]
        dest: String,
    },
    #[command(about = "Generate shell completions")]
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
    #[command(about = "Print version info")]
    Version,
}

/// Resolves a CLI path argument against `--root` unless it is already absolute.
fn resolve_input(input: &str, root: Option<&Path>) -> String {
    let normalized = normalize_slashes(input);
    let Some(root) = root else {
        return normalized;
    };
    if Path::new(&normalized).is_absolute() {
        return normalized;
    }
    join(&normalize_slashes(&root.to_string_lossy()), &normalized)
}

fn open_input(input: &str, root: Option<&Path>) -> Result<FileHandle, Error> {
    FileHandle::open(resolve_input(input, root))
}

fn add_kind_hint(err: Error) -> Error {
    if err.hint().is_some() {
        return err;
    }
    match err.kind() {
        ErrorKind::NotFound => {
            err.with_hint("Check the path, or pass --root to change the base directory.")
        }
        ErrorKind::NotAFile => err.with_hint("Use `fhandle ls` for directories."),
        ErrorKind::NotADirectory => {
            err.with_hint("This command needs a directory; use `fhandle stat` for files.")
        }
        ErrorKind::DestinationNotDirectory => err.with_hint(
            "A directory can only be copied into a directory. Remove the file or pick another destination.",
        ),
        ErrorKind::CrossDevice => err.with_hint(
            "Moves across filesystems are not supported. Use `fhandle cp` then `fhandle rm`.",
        ),
        ErrorKind::StaleAfterMove => err.with_hint(
            "The move happened but the new location could not be inspected. Check it with `fhandle stat`.",
        ),
        _ => err,
    }
}

fn add_io_hint(err: Error) -> Error {
    if err.hint().is_some() {
        return err;
    }
    match err.kind() {
        ErrorKind::Permission => {
            err.with_hint("Permission denied. Check file and directory permissions.")
        }
        ErrorKind::AlreadyExists => err.with_hint("The target already exists. Pick another name."),
        ErrorKind::Io => err.with_hint("I/O error. Check the path, filesystem, and disk space."),
        _ => err,
    }
}

fn add_internal_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Internal || err.hint().is_some() {
        return err;
    }
    err.with_hint(
        "Unexpected internal failure. Retry with RUST_BACKTRACE=1 and share command/context if it persists.",
    )
}

fn emit_version_output() {
    if io::stdout().is_terminal() {
        println!("fhandle {}", env!("CARGO_PKG_VERSION"));
    } else {
        emit_json(json!({
            "name": "fhandle",
            "version": env!("CARGO_PKG_VERSION"),
        }));
    }
}

fn emit_json(value: serde_json::Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn notice_time_now() -> String {
    use time::format_description::well_known::Rfc3339;
    let Ok(duration) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return String::new();
    };
    time::OffsetDateTime::from_unix_timestamp_nanos(duration.as_nanos() as i128)
        .ok()
        .and_then(|ts| ts.format(&Rfc3339).ok())
        .unwrap_or_default()
}

fn emit_notice(notice: &Notice, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        let label = colorize_label("notice:", color_mode.use_color(is_tty), AnsiColor::Yellow);
        eprintln!("{label} {} ({})", notice.message, notice.path);
        return;
    }

    let value = notice_json(notice);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"notice\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::AlreadyExists => "already exists".to_string(),
        ErrorKind::Permission => "permission denied".to_string(),
        ErrorKind::Invalidated => "handle was invalidated".to_string(),
        ErrorKind::NotAFile => "not a file".to_string(),
        ErrorKind::NotADirectory => "not a directory".to_string(),
        ErrorKind::DestinationNotDirectory => "destination is not a directory".to_string(),
        ErrorKind::CrossDevice => "cannot move across devices".to_string(),
        ErrorKind::StaleAfterMove => "moved but could not re-resolve".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    ));

    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(path) = err.path() {
        lines.push(format!(
            "{} {}",
            colorize_label("path:", use_color, AnsiColor::Yellow),
            path.display()
        ));
    }

    let causes = error_causes(err);
    if let Some(cause) = causes.first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }

    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}
