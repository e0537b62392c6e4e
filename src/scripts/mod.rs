// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scripts for the workflows that run the emulator or modify disk images.

use camino::Utf8PathBuf;

use crate::{emulator::Emulator, paths::Layout, paths::OsChoice};

pub mod boot;
pub mod disk;
pub mod snapshot;

/// The installation, guest OS, and emulator a script operates on.
#[derive(Clone, Debug)]
pub struct Target {
    pub layout: Layout,
    pub os: OsChoice,
    pub emulator: Emulator,
}

impl Target {
    pub fn disk_image(&self) -> Utf8PathBuf {
        self.layout.disk_image(self.os)
    }

    pub fn snapshot_dir(&self) -> Utf8PathBuf {
        self.layout.snapshot_dir(self.os)
    }

    pub fn drive_dir(&self) -> Utf8PathBuf {
        self.layout.drive_dir(self.os)
    }

    /// Context entries every script starts with.
    fn base_context(&self) -> Vec<(String, String)> {
        vec![
            ("disk_image".to_string(), self.disk_image().to_string()),
            ("snapshot_dir".to_string(), self.snapshot_dir().to_string()),
            ("drive_dir".to_string(), self.drive_dir().to_string()),
            ("config_file".to_string(), self.layout.config_file().to_string()),
        ]
    }

    fn print_target(
        &self,
        w: &mut dyn std::io::Write,
    ) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "  {}: {}", "Installation root".bold(), self.layout.root())?;
        writeln!(w, "  {}: {}", "Operating system".bold(), self.os)?;
        writeln!(w, "  {}: {}", "Disk image".bold(), self.disk_image())?;
        writeln!(w, "  {}: {}", "Emulator".bold(), self.emulator)
    }
}
