// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! w9xman: runs Windows 9x in DOSBox-X and keeps snapshots of its disk
//! images.

use anyhow::Context as _;
use app::{App, Command};
use clap::Parser;

pub mod app;
pub mod commands;
pub mod config;
pub mod emulator;
pub mod error;
pub mod logging;
pub mod paths;
pub mod runner;
pub mod scripts;
pub mod snapshot;
pub mod steps;
pub mod template;
pub mod util;

fn main() -> anyhow::Result<()> {
    logging::init();

    let app = App::parse();
    let interactive = match app.interactive {
        Some(val) => val,
        None => atty::is(atty::Stream::Stdout),
    };

    let layout = paths::Layout::new(app.root.clone());
    layout.ensure().with_context(|| {
        format!("preparing installation directory {}", layout.root())
    })?;

    let options = runner::RunOptions { interactive, assume_yes: app.yes };
    match &app.command {
        Command::Check => commands::check(&app),
        Command::Config { command } => commands::config(&layout, command),
        Command::Snapshot { command: app::SnapshotCommand::List } => {
            commands::list_snapshots(&layout, app.os)
        }
        _ => {
            let script = commands::get_script(&app, &layout)?;
            runner::run_script(script, options)
        }
    }
}
