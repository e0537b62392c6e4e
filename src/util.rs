// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Utility functions shared by multiple scripts and commands.

use std::process::{Command, Output};

use camino::{Utf8Path, Utf8PathBuf};

use crate::runner::ScriptStep;

/// Runs a `Command` and returns its output. Returns `Err` if the command's exit
/// status indicates that it failed.
pub fn run_command_check_status(cmd: &mut Command) -> anyhow::Result<Output> {
    tracing::debug!(command = ?cmd, "executing");
    let output = cmd.output()?;
    if !output.status.success() {
        anyhow::bail!(
            "'{}' returned non-success exit code: {:?}",
            cmd.get_program().to_string_lossy(),
            output
        );
    }

    Ok(output)
}

/// Returns a message for each command that one of `steps` needs but that
/// can't be found.
pub fn check_executable_prerequisites(steps: &[ScriptStep]) -> Vec<String> {
    let mut missing: Vec<String> = Vec::new();
    for step in steps {
        for command in step.prereq_commands() {
            if which::which(command).is_ok() {
                continue;
            }

            let msg = format!(
                "command '{}' (needed by step '{}') not found",
                command,
                step.label()
            );
            if !missing.contains(&msg) {
                missing.push(msg);
            }
        }
    }

    missing
}

/// Returns a message for each of `files` that doesn't exist.
pub fn check_file_prerequisites(files: &[Utf8PathBuf]) -> Vec<String> {
    files
        .iter()
        .filter(|f| !f.exists())
        .map(|f| format!("file '{}' not found", f))
        .collect()
}

/// The programs tried, in order, to open a file in the user's editor.
const EDITORS: &[(&str, &[&str])] =
    &[("xdg-open", &[]), ("notepad.exe", &[]), ("open", &["-t"])];

/// Opens `path` with the first available desktop editor. Returns the editor
/// that was used.
pub fn open_in_editor(path: &Utf8Path) -> anyhow::Result<&'static str> {
    for (editor, args) in EDITORS {
        if which::which(editor).is_err() {
            continue;
        }

        run_command_check_status(Command::new(editor).args(*args).arg(path))?;
        return Ok(*editor);
    }

    anyhow::bail!("could not find an editor; the file is at {path}")
}
