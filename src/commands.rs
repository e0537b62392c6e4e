// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Maps parsed command lines to scripts, and implements the commands that
//! only report or edit settings and so don't need the script runner.

use anyhow::{Context as _, Result};
use camino::{Utf8Path, Utf8PathBuf};
use colored::Colorize;

use crate::{
    app::{App, Command, ConfigCommand, SnapshotCommand},
    config::ConfigStore,
    emulator::Emulator,
    paths::{Layout, OsChoice},
    runner::Script,
    scripts::{
        boot::{BootArgs, BootMode, BootScript},
        disk::{DiskArgs, DiskScript},
        snapshot::{
            CreateSnapshotArgs, CreateSnapshotScript, RestoreSnapshotArgs,
            RestoreSnapshotScript,
        },
        Target,
    },
    snapshot, template, util,
};

fn emulator_for(app: &App) -> Result<Emulator> {
    match &app.emulator {
        Some(program) => Ok(Emulator::new(program.as_str())),
        None => Ok(Emulator::detect()?),
    }
}

/// Resolves an ISO given on the command line: the path as given if it
/// exists, otherwise the same name inside the installation's ISO directory.
pub fn resolve_iso(layout: &Layout, iso: &Utf8Path) -> Utf8PathBuf {
    if iso.exists() || iso.components().count() > 1 {
        return iso.to_owned();
    }

    let in_iso_dir = layout.iso_dir().join(iso);
    if in_iso_dir.exists() {
        in_iso_dir
    } else {
        iso.to_owned()
    }
}

pub fn get_script(app: &App, layout: &Layout) -> Result<Box<dyn Script>> {
    let target = || -> Result<Target> {
        Ok(Target {
            layout: layout.clone(),
            os: app.os,
            emulator: emulator_for(app)?,
        })
    };

    let script: Box<dyn Script> = match &app.command {
        Command::Start { disk } => Box::new(BootScript::new(BootArgs {
            target: target()?,
            mode: BootMode::Start,
            size_mb: disk.size_mb,
        })),
        Command::MountIso { iso, disk } => Box::new(BootScript::new(BootArgs {
            target: target()?,
            mode: BootMode::MountIso { iso: resolve_iso(layout, &iso.iso) },
            size_mb: disk.size_mb,
        })),
        Command::Install { iso, disk } => Box::new(BootScript::new(BootArgs {
            target: target()?,
            mode: BootMode::Install { iso: resolve_iso(layout, &iso.iso) },
            size_mb: disk.size_mb,
        })),
        Command::CreateDisk { disk } => Box::new(DiskScript::new(DiskArgs {
            target: target()?,
            size_mb: disk.size_mb,
            format: false,
        })),
        Command::Format { disk } => Box::new(DiskScript::new(DiskArgs {
            target: target()?,
            size_mb: disk.size_mb,
            format: true,
        })),
        Command::Snapshot { command } => {
            // Snapshots never run the emulator, so don't insist on finding it.
            let target = Target {
                layout: layout.clone(),
                os: app.os,
                emulator: emulator_for(app)
                    .unwrap_or_else(|_| Emulator::new(crate::emulator::DOSBOX_X)),
            };

            match command {
                SnapshotCommand::Create { name } => {
                    Box::new(CreateSnapshotScript::new(CreateSnapshotArgs {
                        target,
                        name: name.clone(),
                    }))
                }
                SnapshotCommand::Restore { snapshot: name } => {
                    let snapshot =
                        snapshot::resolve(&target.snapshot_dir(), name)?;
                    Box::new(RestoreSnapshotScript::new(RestoreSnapshotArgs {
                        target,
                        snapshot,
                    }))
                }
                SnapshotCommand::List => {
                    anyhow::bail!("listing snapshots doesn't run a script")
                }
            }
        }
        Command::Config { .. } | Command::Check => {
            anyhow::bail!("this command doesn't run a script")
        }
    };

    Ok(script)
}

pub fn list_snapshots(layout: &Layout, os: OsChoice) -> Result<()> {
    let dir = layout.snapshot_dir(os);
    let mut snapshots = snapshot::list(&dir)?;
    if snapshots.is_empty() {
        println!("No snapshots found in {dir}.");
        return Ok(());
    }

    snapshot::sort_chronologically(&mut snapshots);
    println!("{} snapshots in {}:\n", os, dir);
    for snap in snapshots {
        let taken = snap
            .timestamp
            .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "(unknown time)".to_string());
        let size = std::fs::metadata(&snap.path).map(|m| m.len()).unwrap_or(0);

        println!(
            "  {}  {:<30} {:>6} MB  {}",
            taken,
            snap.label.bold(),
            size / (1024 * 1024),
            snap.file_name.dimmed()
        );
    }

    Ok(())
}

pub fn config(layout: &Layout, command: &ConfigCommand) -> Result<()> {
    let path = layout.config_file();
    match command {
        ConfigCommand::Init => {
            // The layout, including the persistent configuration, has
            // already been prepared.
            let store = layout.config_store();
            template::load_or_restore(store.template_path())?;
            println!("{}: {}", "Configuration".bold(), path);
            println!("{}: {}", "Template".bold(), store.template_path());
        }
        ConfigCommand::Show => {
            let doc = ConfigStore::load(&path)?;
            for section in doc.sections() {
                println!("{}", format!("[{}]", section.name()).bold());
                for (option, value) in section.options() {
                    println!("{}={}", option, value);
                }
                println!();
            }
        }
        ConfigCommand::Set { section, option, value } => {
            let mut doc = ConfigStore::load(&path)?;
            let old = doc.set(section, option, value.clone())?;
            ConfigStore::save(&path, &doc)?;

            match old {
                Some(old) => println!("[{section}] {option}: {old} -> {value}"),
                None => println!("[{section}] {option} = {value} (new option)"),
            }
        }
        ConfigCommand::Edit => {
            let editor = util::open_in_editor(&path)?;
            println!("Opened {path} with {editor}.");
        }
    }

    Ok(())
}

/// Confirms that DOSBox-X can be found and run.
pub fn check(app: &App) -> Result<()> {
    let emulator = emulator_for(app).context(
        "DOSBox-X is not installed or not in PATH; please install DOSBox-X \
        from https://dosbox-x.com/",
    )?;

    let version = emulator
        .version()
        .with_context(|| format!("running {emulator} -version"))?;
    println!("{} {}", "Found".green(), emulator);
    println!("  {}", version);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use clap::Parser;

    #[test]
    fn iso_looked_up_in_iso_dir() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(Utf8Path::from_path(dir.path()).unwrap());
        layout.ensure().unwrap();
        std::fs::write(layout.iso_dir().join("win98se.iso"), b"").unwrap();

        assert_eq!(
            resolve_iso(&layout, Utf8Path::new("win98se.iso")),
            layout.iso_dir().join("win98se.iso")
        );
        assert_eq!(
            resolve_iso(&layout, Utf8Path::new("other.iso")),
            Utf8Path::new("other.iso")
        );
        assert_eq!(
            resolve_iso(&layout, Utf8Path::new("/media/cd/setup.iso")),
            Utf8Path::new("/media/cd/setup.iso")
        );
    }

    #[test]
    fn scripts_built_for_workflows() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let layout = Layout::new(root);
        layout.ensure().unwrap();

        let app = App::try_parse_from([
            "w9xman",
            "--emulator",
            "sh",
            "format",
            "--size",
            "1000",
        ])
        .unwrap();
        let script = get_script(&app, &layout).unwrap();
        assert_eq!(script.initial_context()["size_mb"], "1000");

        let app = App::try_parse_from([
            "w9xman",
            "--emulator",
            "sh",
            "snapshot",
            "restore",
            "missing",
        ])
        .unwrap();
        assert!(get_script(&app, &layout).is_err());
    }

    #[test]
    fn config_set_updates_persistent_file() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(Utf8Path::from_path(dir.path()).unwrap());
        layout.ensure().unwrap();

        config(
            &layout,
            &ConfigCommand::Set {
                section: "dosbox".to_string(),
                option: "memsize".to_string(),
                value: "128".to_string(),
            },
        )
        .unwrap();

        let doc = ConfigStore::load(&layout.config_file()).unwrap();
        assert_eq!(doc.get("dosbox", "memsize"), Some("128"));
        assert_eq!(doc.get("cpu", "cycles"), Some("max 80% limit 33000"));
    }

    #[test]
    fn config_set_rejects_unreadable_option() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(Utf8Path::from_path(dir.path()).unwrap());
        layout.ensure().unwrap();
        let before = std::fs::read_to_string(layout.config_file()).unwrap();

        let err = config(
            &layout,
            &ConfigCommand::Set {
                section: "dosbox".to_string(),
                option: "#hidden".to_string(),
                value: "1".to_string(),
            },
        )
        .unwrap_err();

        assert!(err.to_string().contains("#hidden"));
        assert_eq!(std::fs::read_to_string(layout.config_file()).unwrap(), before);
    }
}
