// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The on-disk layout of an installation, rooted at a single directory:
//!
//! ```text
//! <root>/
//!   config/dosbox.conf               persistent emulator configuration
//!   templates/dosbox_template.conf   template for generated configurations
//!   temp_dosbox.conf                 session configuration (exists only
//!                                    while the emulator runs)
//!   disks/win98.img, disks/win95.img
//!   snapshots/, snapshots_win95/
//!   win98_drive/, win95_drive/       host directories mounted as drive E
//!   iso/                             installation media
//! ```

use camino::{Utf8Path, Utf8PathBuf};

use crate::{
    config::ConfigStore,
    error::{Error, Result},
};

/// The guest operating system whose disk image and snapshots to use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OsChoice {
    Win98,
    Win95,
}

impl std::fmt::Display for OsChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            OsChoice::Win98 => "Windows 98",
            OsChoice::Win95 => "Windows 95",
        })
    }
}

#[derive(Clone, Debug)]
pub struct Layout {
    root: Utf8PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn config_dir(&self) -> Utf8PathBuf {
        self.root.join("config")
    }

    pub fn config_file(&self) -> Utf8PathBuf {
        self.config_dir().join("dosbox.conf")
    }

    pub fn templates_dir(&self) -> Utf8PathBuf {
        self.root.join("templates")
    }

    pub fn template_file(&self) -> Utf8PathBuf {
        self.templates_dir().join("dosbox_template.conf")
    }

    pub fn session_file(&self) -> Utf8PathBuf {
        self.root.join("temp_dosbox.conf")
    }

    pub fn disks_dir(&self) -> Utf8PathBuf {
        self.root.join("disks")
    }

    pub fn iso_dir(&self) -> Utf8PathBuf {
        self.root.join("iso")
    }

    pub fn disk_image(&self, os: OsChoice) -> Utf8PathBuf {
        self.disks_dir().join(match os {
            OsChoice::Win98 => "win98.img",
            OsChoice::Win95 => "win95.img",
        })
    }

    pub fn snapshot_dir(&self, os: OsChoice) -> Utf8PathBuf {
        self.root.join(match os {
            OsChoice::Win98 => "snapshots",
            OsChoice::Win95 => "snapshots_win95",
        })
    }

    pub fn drive_dir(&self, os: OsChoice) -> Utf8PathBuf {
        self.root.join(match os {
            OsChoice::Win98 => "win98_drive",
            OsChoice::Win95 => "win95_drive",
        })
    }

    pub fn config_store(&self) -> ConfigStore {
        ConfigStore::new(self.template_file(), self.session_file())
    }

    /// Creates every directory in the layout and a default persistent
    /// configuration if there isn't one yet.
    pub fn ensure(&self) -> Result<()> {
        let mut dirs = vec![
            self.config_dir(),
            self.templates_dir(),
            self.disks_dir(),
            self.iso_dir(),
        ];

        for os in [OsChoice::Win98, OsChoice::Win95] {
            dirs.push(self.snapshot_dir(os));
            dirs.push(self.drive_dir(os));
        }

        for dir in dirs {
            std::fs::create_dir_all(&dir)
                .map_err(Error::io("creating directory", &dir))?;
        }

        self.config_store().ensure_default(&self.config_file())?;
        Ok(())
    }
}
