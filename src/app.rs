// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

use crate::paths::OsChoice;

pub const DEFAULT_DISK_SIZE_MB: u32 = 2000;
pub const MIN_DISK_SIZE_MB: u32 = 500;
pub const MAX_DISK_SIZE_MB: u32 = 4000;

#[derive(Parser)]
#[command(version, about)]
pub struct App {
    /// The installation directory holding configuration, templates, disk
    /// images, snapshots, and ISOs.
    #[arg(long, env = "W9XMAN_ROOT", default_value = ".", global = true)]
    pub root: Utf8PathBuf,

    /// The guest operating system to operate on. Each has its own disk
    /// image, shared folder, and snapshot directory.
    #[arg(long, value_enum, default_value_t = OsChoice::Win98, global = true)]
    pub os: OsChoice,

    /// The DOSBox-X executable to run. If not set, `dosbox-x` is looked up on
    /// the PATH, falling back to the Flatpak build.
    #[arg(long, global = true)]
    pub emulator: Option<String>,

    /// Forces the tool to run in an interactive or non-interactive mode. If not
    /// set, the tool infers whether to run interactively from whether it is
    /// running in an interactive terminal.
    #[arg(long, default_value = Option::None, global = true)]
    pub interactive: Option<bool>,

    /// Skips the confirmation prompt, including for operations that overwrite
    /// a disk image.
    #[arg(long, short, global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Boots the installed system, creating a blank disk image first if
    /// there isn't one.
    Start {
        #[command(flatten)]
        disk: DiskSize,
    },

    /// Boots the installed system with an ISO mounted as drive D.
    MountIso {
        #[command(flatten)]
        iso: IsoSource,

        #[command(flatten)]
        disk: DiskSize,
    },

    /// Boots an installation ISO and runs Windows setup from it.
    Install {
        #[command(flatten)]
        iso: IsoSource,

        #[command(flatten)]
        disk: DiskSize,
    },

    /// Creates a blank disk image if the selected OS doesn't have one yet.
    CreateDisk {
        #[command(flatten)]
        disk: DiskSize,
    },

    /// Deletes the selected OS's disk image and replaces it with a blank one.
    Format {
        #[command(flatten)]
        disk: DiskSize,
    },

    /// Creates, lists, and restores disk image snapshots.
    Snapshot {
        #[command(subcommand)]
        command: SnapshotCommand,
    },

    /// Inspects and edits the persistent DOSBox-X configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Checks that DOSBox-X can be found and reports its version.
    Check,
}

#[derive(Subcommand)]
pub enum SnapshotCommand {
    /// Copies the current disk image into the snapshot directory.
    Create {
        /// A label for the snapshot. Characters other than letters, digits,
        /// `_`, and `-` are replaced with `_`.
        #[arg(value_parser = clap::builder::NonEmptyStringValueParser::new())]
        name: String,
    },

    /// Lists the snapshots of the selected OS, oldest first.
    List,

    /// Replaces the current disk image with a snapshot. The current image is
    /// backed up until the copy has completed.
    Restore {
        /// The snapshot's file name (with or without `.img`) or path.
        snapshot: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Writes the default configuration and template if they're missing.
    Init,

    /// Prints the persistent configuration.
    Show,

    /// Sets an option in the persistent configuration.
    Set {
        section: String,
        option: String,
        value: String,
    },

    /// Opens the persistent configuration in a desktop text editor.
    Edit,
}

#[derive(Args, Clone, Copy)]
pub struct DiskSize {
    /// The size in megabytes of the disk image to create.
    #[arg(
        long = "size",
        default_value_t = DEFAULT_DISK_SIZE_MB,
        value_parser = clap::value_parser!(u32)
            .range(MIN_DISK_SIZE_MB as i64..=MAX_DISK_SIZE_MB as i64),
    )]
    pub size_mb: u32,
}

#[derive(Args, Clone)]
pub struct IsoSource {
    /// The ISO to mount as drive D. A bare file name is looked up in the
    /// installation's `iso` directory if it isn't found as given.
    #[arg(long)]
    pub iso: Utf8PathBuf,
}
