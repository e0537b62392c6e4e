// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Errors returned by the configuration, snapshot, and emulator modules.
//! Scripts wrap these in `anyhow` errors with additional context.

use camino::Utf8PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The configuration template file could not be found. Callers can
    /// recover by writing out the built-in template.
    #[error("template file {path} not found")]
    TemplateMissing { path: Utf8PathBuf },

    #[error("malformed configuration {path}, line {line}: {reason}")]
    ConfigParse { path: Utf8PathBuf, line: usize, reason: String },

    /// A setting that the configuration file format can't represent.
    #[error("can't set [{section}] {option}: {reason}")]
    InvalidSetting { section: String, option: String, reason: String },

    #[error("source file {path} not found")]
    SourceMissing { path: Utf8PathBuf },

    #[error("can't restore {snapshot}: it is the disk image {disk_image} or its backup")]
    SnapshotIsTarget { snapshot: Utf8PathBuf, disk_image: Utf8PathBuf },

    #[error("'{program}' failed ({status}){}", format_stderr(.stderr))]
    ExternalProcess { program: String, status: String, stderr: String },

    #[error(
        "failed to restore snapshot {snapshot}: {source}{}",
        format_backup(.backup)
    )]
    RestoreFailed {
        snapshot: Utf8PathBuf,
        #[source]
        source: std::io::Error,
        backup: Option<Utf8PathBuf>,
    },

    #[error("no DOSBox-X installation found (tried: {tried})")]
    EmulatorNotFound { tried: String },

    #[error("{context} {path}: {source}")]
    Io {
        context: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(
        context: &'static str,
        path: impl Into<Utf8PathBuf>,
    ) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Error::Io { context, path, source }
    }
}

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

fn format_backup(backup: &Option<Utf8PathBuf>) -> String {
    match backup {
        Some(path) => format!(" (previous image kept at {path})"),
        None => String::new(),
    }
}
