// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Defines the scripts that take a snapshot of a disk image and that restore
//! a disk image from a snapshot.

use std::collections::HashMap;

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use colored::Colorize;

use crate::{
    runner::{Context, MissingPrerequisites, Script, ScriptStep, Ui},
    snapshot,
    util::check_file_prerequisites,
};

use super::Target;

pub struct CreateSnapshotArgs {
    pub target: Target,

    /// The user's label for the snapshot, before sanitizing.
    pub name: String,
}

pub struct CreateSnapshotScript {
    steps: Vec<ScriptStep>,
    args: CreateSnapshotArgs,
}

impl CreateSnapshotScript {
    pub fn new(script_args: CreateSnapshotArgs) -> Self {
        Self {
            steps: vec![ScriptStep::new(
                "copy disk image to snapshot directory",
                create_snapshot,
            )],
            args: script_args,
        }
    }
}

impl Script for CreateSnapshotScript {
    fn steps(&self) -> &[ScriptStep] {
        self.steps.as_slice()
    }

    fn print_configuration(
        &self,
        w: &mut dyn std::io::Write,
    ) -> std::io::Result<()> {
        let args = &self.args;
        writeln!(w, "Creating a snapshot with these options:\n")?;
        args.target.print_target(w)?;
        writeln!(
            w,
            "  {}: {}",
            "Snapshot directory".bold(),
            args.target.snapshot_dir()
        )?;
        writeln!(
            w,
            "  {}: {}",
            "Snapshot label".bold(),
            snapshot::sanitize_name(&args.name)
        )
    }

    fn check_prerequisites(&self) -> MissingPrerequisites {
        MissingPrerequisites::from_messages(
            check_file_prerequisites(&[self.args.target.disk_image()]),
            vec![],
        )
    }

    fn initial_context(&self) -> HashMap<String, String> {
        let mut ctx: HashMap<String, String> =
            self.args.target.base_context().into_iter().collect();
        ctx.insert("snapshot_name".to_string(), self.args.name.clone());
        ctx
    }
}

fn create_snapshot(ctx: &mut Context, ui: &Ui) -> Result<()> {
    let image = Utf8Path::new(ctx.require_var("disk_image")?);
    let dir = Utf8Path::new(ctx.require_var("snapshot_dir")?);
    let name = ctx.require_var("snapshot_name")?;

    ui.set_substep(format!("copying {image}"));
    let path = snapshot::create(image, dir, name)?;
    ui.println(format!("snapshot saved to {path}"));

    ctx.set_var("snapshot_path", path.into_string());
    Ok(())
}

pub struct RestoreSnapshotArgs {
    pub target: Target,

    /// The snapshot to restore, already resolved to a path.
    pub snapshot: Utf8PathBuf,
}

pub struct RestoreSnapshotScript {
    steps: Vec<ScriptStep>,
    args: RestoreSnapshotArgs,
}

impl RestoreSnapshotScript {
    pub fn new(script_args: RestoreSnapshotArgs) -> Self {
        Self {
            steps: vec![ScriptStep::new(
                "restore disk image from snapshot",
                restore_snapshot,
            )],
            args: script_args,
        }
    }
}

impl Script for RestoreSnapshotScript {
    fn steps(&self) -> &[ScriptStep] {
        self.steps.as_slice()
    }

    fn print_configuration(
        &self,
        w: &mut dyn std::io::Write,
    ) -> std::io::Result<()> {
        let args = &self.args;
        writeln!(w, "Restoring a snapshot with these options:\n")?;
        args.target.print_target(w)?;
        writeln!(w, "  {}: {}", "Snapshot".bold(), args.snapshot)?;

        if args.target.disk_image().exists() {
            writeln!(w)?;
            writeln!(
                w,
                "  {}",
                "The current disk image will be replaced by the snapshot."
                    .red()
            )?;
        }

        Ok(())
    }

    fn check_prerequisites(&self) -> MissingPrerequisites {
        MissingPrerequisites::from_messages(
            check_file_prerequisites(&[self.args.snapshot.clone()]),
            vec![],
        )
    }

    fn initial_context(&self) -> HashMap<String, String> {
        let mut ctx: HashMap<String, String> =
            self.args.target.base_context().into_iter().collect();
        ctx.insert("snapshot_path".to_string(), self.args.snapshot.to_string());
        ctx
    }

    fn is_destructive(&self) -> bool {
        true
    }
}

fn restore_snapshot(ctx: &mut Context, ui: &Ui) -> Result<()> {
    let image = Utf8Path::new(ctx.require_var("disk_image")?);
    let snapshot_path = Utf8Path::new(ctx.require_var("snapshot_path")?);

    ui.set_substep(format!(
        "backing up to {} and copying {snapshot_path}",
        snapshot::backup_path(image)
    ));
    snapshot::restore(image, snapshot_path)?;
    ui.println(format!("{image} restored from {snapshot_path}"));
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{paths::OsChoice, scripts::test_support::TestTarget};

    #[test]
    fn create_needs_disk_image() {
        let t = TestTarget::new(OsChoice::Win95);
        let script = CreateSnapshotScript::new(CreateSnapshotArgs {
            target: t.target.clone(),
            name: "My Save #1".to_string(),
        });

        assert_eq!(script.check_prerequisites().errors.len(), 1);
        assert!(t.configuration(&script).contains("My_Save__1"));

        std::fs::write(t.target.disk_image(), b"disk").unwrap();
        assert!(script.check_prerequisites().errors.is_empty());
        assert_eq!(script.initial_context()["snapshot_name"], "My Save #1");
    }

    #[test]
    fn restore_is_destructive() {
        let t = TestTarget::new(OsChoice::Win98);
        let snap = t.target.snapshot_dir().join("20240101_120000_a.img");
        let script = RestoreSnapshotScript::new(RestoreSnapshotArgs {
            target: t.target.clone(),
            snapshot: snap.clone(),
        });

        assert!(script.is_destructive());
        assert_eq!(script.check_prerequisites().errors.len(), 1);

        std::fs::write(&snap, b"snap").unwrap();
        assert!(script.check_prerequisites().errors.is_empty());
        assert_eq!(script.initial_context()["snapshot_path"], snap.as_str());
    }
}
