// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Script steps that are shared between multiple scripts.

use anyhow::{Context as _, Result};
use camino::Utf8Path;

use crate::{
    config::ConfigStore,
    emulator::{Emulator, Workflow},
    runner::Ui,
};

/// Uses DOSBox-X to create a blank disk image at `image_path`, failing if
/// the emulator exits without having produced one.
pub fn create_disk_image(
    emulator: &Emulator,
    image_path: &Utf8Path,
    size_mb: u32,
    ui: &Ui,
) -> Result<()> {
    ui.set_substep(format!("imgmake {image_path} ({size_mb} MB, FAT32)"));
    let created = emulator
        .create_disk_image(image_path, size_mb)
        .with_context(|| format!("creating disk image {image_path}"))?;

    if !created {
        anyhow::bail!("{emulator} did not create {image_path}");
    }

    Ok(())
}

/// Creates the disk image unless it already exists. Returns whether an image
/// was created.
pub fn ensure_disk_image(
    emulator: &Emulator,
    image_path: &Utf8Path,
    size_mb: u32,
    ui: &Ui,
) -> Result<bool> {
    if image_path.exists() {
        ui.set_substep("disk image already exists");
        return Ok(false);
    }

    create_disk_image(emulator, image_path, size_mb, ui)?;
    Ok(true)
}

/// Renders a session configuration for `workflow` and runs the emulator with
/// it until the emulator exits.
pub fn run_workflow(
    emulator: &Emulator,
    store: &ConfigStore,
    config_file: &Utf8Path,
    workflow: &Workflow,
    image_path: &Utf8Path,
    drive_dir: &Utf8Path,
    ui: &Ui,
) -> Result<()> {
    ui.set_substep(format!("rendering {}", store.session_path()));
    let autoexec = workflow.autoexec(image_path, drive_dir);
    let session = store
        .render_session(config_file, &autoexec)
        .context("rendering session configuration")?;

    ui.set_substep(format!("waiting for {emulator} to exit"));
    let code = emulator.launch(session, &[])?;
    if code != 0 {
        anyhow::bail!("{emulator} exited with code {code}");
    }

    Ok(())
}
