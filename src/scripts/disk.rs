// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Defines the scripts that create a blank disk image, either alongside an
//! existing one (which is left alone) or in place of it.

use std::collections::HashMap;

use anyhow::{Context as _, Result};
use camino::Utf8Path;
use colored::Colorize;

use crate::{
    emulator::Emulator,
    runner::{Context, MissingPrerequisites, Script, ScriptStep, Ui},
    steps,
    util::check_executable_prerequisites,
};

use super::Target;

pub struct DiskArgs {
    pub target: Target,
    pub size_mb: u32,

    /// Replace an existing disk image instead of keeping it.
    pub format: bool,
}

pub struct DiskScript {
    steps: Vec<ScriptStep>,
    args: DiskArgs,
}

impl DiskScript {
    pub fn new(script_args: DiskArgs) -> Self {
        Self { steps: get_script(&script_args), args: script_args }
    }
}

impl Script for DiskScript {
    fn steps(&self) -> &[ScriptStep] {
        self.steps.as_slice()
    }

    fn print_configuration(
        &self,
        w: &mut dyn std::io::Write,
    ) -> std::io::Result<()> {
        let args = &self.args;
        let verb = if args.format { "Formatting" } else { "Creating" };
        writeln!(w, "{} a disk image with these options:\n", verb)?;
        args.target.print_target(w)?;
        writeln!(w, "  {}: {} MB (FAT32)", "Size".bold(), args.size_mb)?;

        if args.format && args.target.disk_image().exists() {
            writeln!(w)?;
            writeln!(
                w,
                "  {}",
                "The existing disk image and everything on it will be deleted."
                    .red()
            )?;
        }

        Ok(())
    }

    fn check_prerequisites(&self) -> MissingPrerequisites {
        let mut warnings = Vec::new();
        let image = self.args.target.disk_image();
        if image.exists() && !self.args.format {
            warnings.push(format!(
                "disk image '{image}' already exists and won't be replaced; use \
                `format` to replace it"
            ));
        }

        MissingPrerequisites::from_messages(
            check_executable_prerequisites(self.steps()),
            warnings,
        )
    }

    fn initial_context(&self) -> HashMap<String, String> {
        let mut ctx: HashMap<String, String> =
            self.args.target.base_context().into_iter().collect();
        ctx.insert("size_mb".to_string(), self.args.size_mb.to_string());
        ctx
    }

    fn is_destructive(&self) -> bool {
        self.args.format && self.args.target.disk_image().exists()
    }
}

fn remove_disk_image(ctx: &mut Context, ui: &Ui) -> Result<()> {
    let image = Utf8Path::new(ctx.require_var("disk_image")?);
    if !image.exists() {
        ui.set_substep("no existing disk image");
        return Ok(());
    }

    tracing::info!(%image, "removing disk image");
    std::fs::remove_file(image)
        .with_context(|| format!("removing disk image {image}"))
}

fn create_disk_image(
    emulator: &Emulator,
    ctx: &mut Context,
    ui: &Ui,
) -> Result<()> {
    let size_mb = ctx.require_var("size_mb")?.parse()?;
    let image = Utf8Path::new(ctx.require_var("disk_image")?);
    if steps::ensure_disk_image(emulator, image, size_mb, ui)? {
        ui.println(format!("created {size_mb} MB disk image {image}"));
    } else {
        ui.println(format!("{image} already exists; leaving it unchanged"));
    }

    Ok(())
}

fn get_script(args: &DiskArgs) -> Vec<ScriptStep> {
    let program = args.target.emulator.program().to_owned();
    let emulator = args.target.emulator.clone();

    let mut steps = Vec::new();
    if args.format {
        steps.push(ScriptStep::new(
            "remove existing disk image",
            remove_disk_image,
        ));
    }

    steps.push(ScriptStep::with_prereqs(
        "create blank disk image",
        move |ctx, ui| create_disk_image(&emulator, ctx, ui),
        &[program.as_str()],
    ));

    steps
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{paths::OsChoice, scripts::test_support::TestTarget};

    #[test]
    fn format_is_destructive_only_with_existing_image() {
        let t = TestTarget::new(OsChoice::Win98);
        let script = |format| {
            DiskScript::new(DiskArgs {
                target: t.target.clone(),
                size_mb: 500,
                format,
            })
        };

        assert!(!script(true).is_destructive());
        assert_eq!(script(true).steps().len(), 2);
        assert_eq!(script(false).steps().len(), 1);

        std::fs::write(t.target.disk_image(), b"data").unwrap();
        assert!(script(true).is_destructive());
        assert!(!script(false).is_destructive());

        assert!(script(true).check_prerequisites().warnings.is_empty());
        let kept = script(false).check_prerequisites();
        assert!(kept.errors.is_empty());
        assert!(kept.warnings[0].contains("already exists"));

        let config = t.configuration(&script(true));
        assert!(config.contains("500 MB"));
        assert!(config.contains("will be"));
        assert_eq!(script(false).initial_context()["size_mb"], "500");
    }
}
