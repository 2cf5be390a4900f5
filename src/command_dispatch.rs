//! Purpose: Hold top-level CLI command dispatch for `fhandle`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Each command opens fresh handles; nothing is cached across runs.
//! Invariants: Partial copies exit non-zero but still print the full report.

use std::io::Write;

use super::*;
use fhandle::notice::paste_failure_notices;
use super::handle_info_json::{children_json, handle_json, paste_report_json};

pub(super) fn dispatch_command(
    command: Command,
    root: Option<&Path>,
    color_mode: ColorMode,
) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "fhandle", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            emit_version_output();
            Ok(RunOutcome::ok())
        }
        Command::Stat { path, digest } => {
            let handle = open_input(&path, root)?;
            let sha256 = if digest {
                Some(handle.digest()?)
            } else {
                None
            };
            emit_json(handle_json(&handle, sha256));
            Ok(RunOutcome::ok())
        }
        Command::Cat { path } => {
            let handle = open_input(&path, root)?;
            let bytes = handle.read()?;
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(&bytes)
                .and_then(|()| stdout.flush())
                .map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write to stdout")
                        .with_source(err)
                })?;
            Ok(RunOutcome::ok())
        }
        Command::Ls { path, sort } => {
            let handle = open_input(&path, root)?;
            let mut children = handle.children()?;
            if sort {
                children.sort_by(|a, b| a.name().cmp(b.name()));
            }
            emit_json(children_json(&children));
            Ok(RunOutcome::ok())
        }
        Command::Mkdir { dir, name } => {
            let handle = open_input(&dir, root)?;
            let created = handle.mkdir_all(&name)?;
            emit_json(handle_json(&created, None));
            Ok(RunOutcome::ok())
        }
        Command::Rm { path } => {
            let mut handle = open_input(&path, root)?;
            let removed = handle.path().to_string();
            handle.remove()?;
            emit_json(json!({ "removed": removed }));
            Ok(RunOutcome::ok())
        }
        Command::Rename { path, name } => {
            let mut handle = open_input(&path, root)?;
            handle.rename(&name)?;
            emit_json(handle_json(&handle, None));
            Ok(RunOutcome::ok())
        }
        Command::Mv { path, dest } => {
            let mut handle = open_input(&path, root)?;
            handle.move_to(&resolve_input(&dest, root))?;
            emit_json(handle_json(&handle, None));
            Ok(RunOutcome::ok())
        }
        Command::Cp { src, dest } => {
            let handle = open_input(&src, root)?;
            let report = handle.paste(&resolve_input(&dest, root))?;
            let time = notice_time_now();
            for notice in paste_failure_notices(&report, "cp", &time) {
                emit_notice(&notice, color_mode);
            }
            emit_json(paste_report_json(&report));
            if report.is_complete() {
                Ok(RunOutcome::ok())
            } else {
                Ok(RunOutcome::with_code(to_exit_code(ErrorKind::Io)))
            }
        }
    }
}
