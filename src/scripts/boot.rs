// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Defines the scripts that start DOSBox-X: booting an installed system
//! (optionally with an ISO attached) and booting the installer from an ISO.

use std::collections::HashMap;

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use colored::Colorize;

use crate::{
    emulator::{Emulator, Workflow},
    runner::{Context, MissingPrerequisites, Script, ScriptStep, Ui},
    steps,
    util::{check_executable_prerequisites, check_file_prerequisites},
};

use super::Target;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BootMode {
    /// Boot the installed system from drive C.
    Start,

    /// Boot the installed system with an ISO mounted as drive D.
    MountIso { iso: Utf8PathBuf },

    /// Run Windows setup from an ISO mounted as drive D.
    Install { iso: Utf8PathBuf },
}

impl BootMode {
    fn iso(&self) -> Option<&Utf8Path> {
        match self {
            BootMode::Start => None,
            BootMode::MountIso { iso } | BootMode::Install { iso } => {
                Some(iso.as_path())
            }
        }
    }
}

pub struct BootArgs {
    pub target: Target,
    pub mode: BootMode,

    /// The size of the disk image to create if there isn't one yet.
    pub size_mb: u32,
}

pub struct BootScript {
    steps: Vec<ScriptStep>,
    args: BootArgs,
}

impl BootScript {
    pub fn new(script_args: BootArgs) -> Self {
        Self { steps: get_script(&script_args), args: script_args }
    }
}

impl Script for BootScript {
    fn steps(&self) -> &[ScriptStep] {
        self.steps.as_slice()
    }

    fn print_configuration(
        &self,
        w: &mut dyn std::io::Write,
    ) -> std::io::Result<()> {
        let args = &self.args;
        let action = match args.mode {
            BootMode::Start => "Starting",
            BootMode::MountIso { .. } => "Starting with an ISO mounted",
            BootMode::Install { .. } => "Installing",
        };

        writeln!(w, "{} {} with these options:\n", action, args.target.os)?;
        args.target.print_target(w)?;

        if let Some(iso) = args.mode.iso() {
            writeln!(w, "  {}: {}", "ISO (drive D)".bold(), iso)?;
        }

        if !matches!(args.mode, BootMode::Install { .. }) {
            writeln!(
                w,
                "  {}: {}",
                "Shared folder (drive E)".bold(),
                args.target.drive_dir()
            )?;
        }

        Ok(())
    }

    fn check_prerequisites(&self) -> MissingPrerequisites {
        let mut errors = Vec::new();
        if let Some(iso) = self.args.mode.iso() {
            errors.extend(check_file_prerequisites(&[iso.to_owned()]));
        }

        errors.extend(check_executable_prerequisites(self.steps()));

        let mut warnings = Vec::new();
        let image = self.args.target.disk_image();
        if !image.exists() {
            warnings.push(format!(
                "disk image '{image}' doesn't exist yet; a blank {} MB image \
                will be created",
                self.args.size_mb
            ));
        }

        MissingPrerequisites::from_messages(errors, warnings)
    }

    fn initial_context(&self) -> HashMap<String, String> {
        let args = &self.args;
        let mut ctx: HashMap<String, String> =
            args.target.base_context().into_iter().collect();

        ctx.insert("size_mb".to_string(), args.size_mb.to_string());
        if let Some(iso) = args.mode.iso() {
            ctx.insert("iso".to_string(), iso.to_string());
        }

        ctx
    }
}

fn create_disk_if_missing(
    emulator: &Emulator,
    ctx: &mut Context,
    ui: &Ui,
) -> Result<()> {
    let size_mb = ctx.require_var("size_mb")?.parse()?;
    let image = Utf8Path::new(ctx.require_var("disk_image")?);
    if steps::ensure_disk_image(emulator, image, size_mb, ui)? {
        ui.println(format!("created {size_mb} MB disk image {image}"));
    }

    Ok(())
}

fn run_emulator(
    target: &Target,
    mode: &BootMode,
    ctx: &mut Context,
    ui: &Ui,
) -> Result<()> {
    let iso = ctx.get_var("iso").map(Utf8Path::new);
    let workflow = match (mode, iso) {
        (BootMode::Start, _) => Workflow::Boot,
        (BootMode::MountIso { .. }, Some(iso)) => Workflow::BootWithIso { iso },
        (BootMode::Install { .. }, Some(iso)) => Workflow::Install { iso },
        (_, None) => anyhow::bail!("no ISO selected"),
    };

    steps::run_workflow(
        &target.emulator,
        &target.layout.config_store(),
        Utf8Path::new(ctx.require_var("config_file")?),
        &workflow,
        Utf8Path::new(ctx.require_var("disk_image")?),
        Utf8Path::new(ctx.require_var("drive_dir")?),
        ui,
    )
}

fn get_script(args: &BootArgs) -> Vec<ScriptStep> {
    let program = args.target.emulator.program().to_owned();
    let emulator = args.target.emulator.clone();
    let target = args.target.clone();
    let mode = args.mode.clone();

    let label = match args.mode {
        BootMode::Start | BootMode::MountIso { .. } => "run Windows in DOSBox-X",
        BootMode::Install { .. } => "run Windows setup in DOSBox-X",
    };

    vec![
        ScriptStep::with_prereqs(
            "create disk image if missing",
            move |ctx, ui| create_disk_if_missing(&emulator, ctx, ui),
            &[program.as_str()],
        ),
        ScriptStep::with_prereqs(
            label,
            move |ctx, ui| run_emulator(&target, &mode, ctx, ui),
            &[program.as_str()],
        ),
    ]
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{paths::OsChoice, scripts::test_support::TestTarget};

    #[test]
    fn install_context_and_configuration() {
        let t = TestTarget::new(OsChoice::Win95);
        let iso = t.root.join("iso/win95.iso");
        std::fs::write(&iso, b"").unwrap();

        let script = BootScript::new(BootArgs {
            target: t.target.clone(),
            mode: BootMode::Install { iso: iso.clone() },
            size_mb: 2000,
        });

        let ctx = script.initial_context();
        assert_eq!(ctx["iso"], iso.as_str());
        assert_eq!(ctx["size_mb"], "2000");
        assert!(ctx["disk_image"].ends_with("disks/win95.img"));

        let config = t.configuration(&script);
        assert!(config.contains("win95.iso"));
        assert!(!config.contains("win95_drive"));

        let missing = script.check_prerequisites();
        assert!(missing.errors.is_empty());
        assert_eq!(missing.warnings.len(), 1);
        assert!(missing.warnings[0].contains("2000 MB"));

        std::fs::write(t.target.disk_image(), b"disk").unwrap();
        assert!(script.check_prerequisites().warnings.is_empty());
        assert!(!script.is_destructive());
        assert_eq!(script.steps().len(), 2);
    }

    #[test]
    fn missing_iso_is_reported() {
        let t = TestTarget::new(OsChoice::Win98);
        let script = BootScript::new(BootArgs {
            target: t.target.clone(),
            mode: BootMode::MountIso { iso: t.root.join("iso/missing.iso") },
            size_mb: 2000,
        });

        let missing = script.check_prerequisites();
        assert_eq!(missing.errors.len(), 1);
        assert!(missing.errors[0].contains("missing.iso"));
    }

    #[test]
    fn start_mentions_shared_folder() {
        let t = TestTarget::new(OsChoice::Win98);
        let script = BootScript::new(BootArgs {
            target: t.target.clone(),
            mode: BootMode::Start,
            size_mb: 2000,
        });

        let config = t.configuration(&script);
        assert!(config.contains("win98_drive"));
        assert!(!script.initial_context().contains_key("iso"));
    }
}
