// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Invoking DOSBox-X: finding it, running it against a session
//! configuration, and using its scripted mode to create disk images.

use std::process::{Command, Output, Stdio};

use camino::Utf8Path;
use itertools::Itertools;

use crate::{
    config::SessionConfig,
    error::{Error, Result},
};

pub const DOSBOX_X: &str = "dosbox-x";
pub const FLATPAK: &str = "flatpak";
pub const FLATPAK_APP_ID: &str = "com.dosbox_x.DOSBox-X";

/// How to start the emulator: a program and the arguments that always come
/// before any per-invocation arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Emulator {
    program: String,
    prefix_args: Vec<String>,
}

impl Emulator {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), prefix_args: Vec::new() }
    }

    /// DOSBox-X installed from Flathub.
    pub fn flatpak() -> Self {
        Self {
            program: FLATPAK.to_string(),
            prefix_args: vec!["run".to_string(), FLATPAK_APP_ID.to_string()],
        }
    }

    /// Prefers a `dosbox-x` on the `PATH`, then a Flatpak installation.
    pub fn detect() -> Result<Self> {
        if let Ok(path) = which::which(DOSBOX_X) {
            tracing::debug!(path = %path.display(), "found DOSBox-X");
            return Ok(Self::new(DOSBOX_X));
        }

        if which::which(FLATPAK).is_ok() {
            tracing::debug!("DOSBox-X not on PATH, using Flatpak");
            return Ok(Self::flatpak());
        }

        Err(Error::EmulatorNotFound {
            tried: format!("{DOSBOX_X}, {FLATPAK} run {FLATPAK_APP_ID}"),
        })
    }

    /// The executable that has to be present for this emulator to run.
    pub fn program(&self) -> &str {
        &self.program
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.prefix_args);
        cmd
    }

    fn run(&self, cmd: &mut Command) -> Result<Output> {
        tracing::info!(command = ?cmd, "running emulator");
        cmd.output().map_err(|e| Error::ExternalProcess {
            program: self.to_string(),
            status: format!("could not be started: {e}"),
            stderr: String::new(),
        })
    }

    fn process_error(&self, output: &Output) -> Error {
        Error::ExternalProcess {
            program: self.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }

    /// Asks the emulator for its version and returns the first line it
    /// prints.
    pub fn version(&self) -> Result<String> {
        let output = self.run(self.command().arg("-version"))?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        stdout
            .lines()
            .chain(stderr.lines())
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_owned)
            .ok_or_else(|| self.process_error(&output))
    }

    fn run_session(
        &self,
        session: SessionConfig,
        extra_args: &[String],
    ) -> Result<Output> {
        let mut cmd = self.command();
        cmd.arg("-conf").arg(session.path()).args(extra_args);

        // The emulator shares the console; only stderr is kept for error
        // reports.
        cmd.stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped());

        // `session` is dropped on return, removing the configuration whether
        // or not the emulator ran.
        self.run(&mut cmd)
    }

    /// Runs the emulator with `session` as its configuration, waits for it
    /// to exit, and returns its exit code. The session configuration is
    /// deleted afterwards in every case.
    pub fn launch(
        &self,
        session: SessionConfig,
        extra_args: &[String],
    ) -> Result<i32> {
        let output = self.run_session(session, extra_args)?;
        let Some(code) = output.status.code() else {
            return Err(self.process_error(&output));
        };

        if code != 0 {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(
                code,
                stderr = %stderr.trim(),
                "emulator exited with an error"
            );
        }

        Ok(code)
    }

    /// Creates a blank FAT32 hard disk image of `size_mb` megabytes at
    /// `image` using DOSBox-X's `imgmake` command. Returns whether the image
    /// exists once the emulator has exited.
    pub fn create_disk_image(&self, image: &Utf8Path, size_mb: u32) -> Result<bool> {
        if let Some(parent) = image.parent() {
            std::fs::create_dir_all(parent)
                .map_err(Error::io("creating disk image directory", parent))?;
        }

        let mut cmd = self.command();
        cmd.args(imgmake_args(image, size_mb));

        let output = self.run(&mut cmd)?;
        if !output.status.success() {
            return Err(self.process_error(&output));
        }

        let created = image.is_file();
        if !created {
            tracing::warn!(%image, "emulator exited cleanly but created no image");
        }

        Ok(created)
    }
}

impl std::fmt::Display for Emulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            std::iter::once(&self.program).chain(&self.prefix_args).join(" ")
        )
    }
}

/// The scripted-mode arguments that make DOSBox-X create a disk image and
/// exit.
pub fn imgmake_args(image: &Utf8Path, size_mb: u32) -> Vec<String> {
    vec![
        "-c".to_string(),
        format!("imgmake \"{image}\" -size {size_mb} -fat 32 -t hd"),
        "-c".to_string(),
        "exit".to_string(),
    ]
}

/// The startup sequences the emulator can be asked to run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Workflow<'a> {
    /// Boot the installed system from drive C.
    Boot,

    /// Boot from drive C with an ISO available as drive D.
    BootWithIso { iso: &'a Utf8Path },

    /// Run the installer from an ISO mounted as drive D.
    Install { iso: &'a Utf8Path },
}

impl Workflow<'_> {
    /// Builds the autoexec commands for this workflow. `drive_dir` is the
    /// host directory exposed as drive E when booting an installed system.
    pub fn autoexec(&self, hdd: &Utf8Path, drive_dir: &Utf8Path) -> String {
        let mut lines = vec![
            "# Mount the Windows HDD image as drive C".to_string(),
            format!("imgmount c \"{hdd}\" -t hdd -fs fat"),
        ];

        let iso = match self {
            Workflow::Boot => None,
            Workflow::BootWithIso { iso } | Workflow::Install { iso } => {
                Some(iso)
            }
        };

        if let Some(iso) = iso {
            lines.push("# Mount the ISO as drive D".to_string());
            lines.push(format!("imgmount d \"{iso}\" -t iso"));
        }

        match self {
            Workflow::Boot | Workflow::BootWithIso { .. } => {
                lines.push("# Mount the local directory as drive E".to_string());
                lines.push(format!("mount e \"{drive_dir}\""));
                lines.push("boot c:".to_string());
            }
            Workflow::Install { .. } => {
                lines.push("# Start the setup program".to_string());
                lines.push("d:".to_string());
                lines.push("setup.exe".to_string());
            }
        }

        lines.join("\n") + "\n"
    }
}
