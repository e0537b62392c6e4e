// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reading and writing DOSBox-X configuration files, and rendering the
//! per-session configuration handed to the emulator.

use std::{collections::HashMap, fmt::Write as _};

use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;

use crate::{
    error::{Error, Result},
    template,
};

/// The section holding startup commands. It is never carried over from the
/// persistent configuration into a session configuration.
pub const AUTOEXEC_SECTION: &str = "autoexec";

/// A variable the session template understands, where its value lives in the
/// persistent configuration, and what to use if it isn't there.
pub struct SessionVar {
    pub name: &'static str,
    pub section: &'static str,
    pub default: &'static str,
}

pub const SESSION_VARS: &[SessionVar] = &[
    SessionVar { name: "memsize", section: "dosbox", default: "64" },
    SessionVar {
        name: "cycles",
        section: "cpu",
        default: "max 80% limit 33000",
    },
    SessionVar { name: "machine", section: "dosbox", default: "svga_s3" },
    SessionVar {
        name: "windowresolution",
        section: "sdl",
        default: "1024x768",
    },
    SessionVar { name: "output", section: "sdl", default: "opengl" },
];

fn default_vars() -> HashMap<String, String> {
    SESSION_VARS
        .iter()
        .map(|v| (v.name.to_string(), v.default.to_string()))
        .collect()
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Section {
    name: String,
    options: Vec<(String, String)>,
}

impl Section {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> impl Iterator<Item = (&str, &str)> {
        self.options.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn get(&self, option: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(k, _)| k == option)
            .map(|(_, v)| v.as_str())
    }

    /// Sets `option`, keeping its position if it already exists. Returns the
    /// previous value.
    fn set(&mut self, option: &str, value: String) -> Option<String> {
        match self.options.iter_mut().find(|(k, _)| k == option) {
            Some((_, old)) => Some(std::mem::replace(old, value)),
            None => {
                self.options.push((option.to_owned(), value));
                None
            }
        }
    }
}

/// An ordered set of named sections. Section and option names are case
/// sensitive and unique within their scope; insertion order is preserved.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigDocument {
    sections: Vec<Section>,
}

impl ConfigDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses sectioned `key=value` text. `path` is used only for error
    /// reporting.
    ///
    /// Blank lines, `#`/`;` comments, and any other line that is neither a
    /// section header nor contains `=` are ignored. A repeated option takes
    /// the last value, and a repeated section header continues the existing
    /// section.
    pub fn parse(text: &str, path: &Utf8Path) -> Result<Self> {
        let mut doc = Self::new();
        let mut current: Option<usize> = None;

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            let parse_error = |reason: &str| Error::ConfigParse {
                path: path.to_owned(),
                line: index + 1,
                reason: reason.to_owned(),
            };

            if line.is_empty() || line.starts_with('#') || line.starts_with(';')
            {
                continue;
            }

            if let Some(header) = line.strip_prefix('[') {
                // Anything after the closing bracket is ignored.
                let Some((name, _)) = header.split_once(']') else {
                    return Err(parse_error("unterminated section header"));
                };

                let name = name.trim();
                if name.is_empty() {
                    return Err(parse_error("empty section name"));
                }

                current = Some(doc.section_index_or_insert(name));
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };

            let Some(section) = current else {
                return Err(parse_error("option outside of any section"));
            };

            let key = key.trim();
            if key.is_empty() {
                return Err(parse_error("empty option name"));
            }

            doc.sections[section].set(key, value.trim().to_owned());
        }

        Ok(doc)
    }

    fn section_index_or_insert(&mut self, name: &str) -> usize {
        match self.sections.iter().position(|s| s.name == name) {
            Some(index) => index,
            None => {
                self.sections
                    .push(Section { name: name.to_owned(), options: vec![] });
                self.sections.len() - 1
            }
        }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn get(&self, section: &str, option: &str) -> Option<&str> {
        self.section(section).and_then(|s| s.get(option))
    }

    /// Sets `section.option`, creating the section at the end of the
    /// document if it doesn't exist yet. Returns the previous value.
    ///
    /// Fails with [`Error::InvalidSetting`] if the section name, option name,
    /// or value couldn't be read back unchanged by [`ConfigDocument::parse`].
    pub fn set(
        &mut self,
        section: &str,
        option: &str,
        value: impl Into<String>,
    ) -> Result<Option<String>> {
        let value = value.into();
        let invalid = |reason: &str| Error::InvalidSetting {
            section: section.to_owned(),
            option: option.to_owned(),
            reason: reason.to_owned(),
        };

        if let Some(reason) = check_name(section, &[']']) {
            return Err(invalid(&format!("section name {reason}")));
        }

        if let Some(reason) = check_name(option, &['=']) {
            return Err(invalid(&format!("option name {reason}")));
        }

        if option.starts_with(['#', ';', '[']) {
            return Err(invalid("option name starts with a comment or header marker"));
        }

        if value.contains(['\n', '\r']) {
            return Err(invalid("value contains a line break"));
        }

        if value.trim() != value {
            return Err(invalid("value has leading or trailing whitespace"));
        }

        let index = self.section_index_or_insert(section);
        Ok(self.sections[index].set(option, value))
    }

    /// Formats the document in the same sectioned text format `parse` reads.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let mut sections = self.sections.iter().map(|section| {
            let mut text = format!("[{}]\n", section.name);
            for (key, value) in section.options() {
                let _ = writeln!(text, "{key}={value}");
            }
            text
        });

        out.push_str(&sections.join("\n"));
        out
    }

    /// The template variables recognised by the session template, taken from
    /// this document where present and defaulted otherwise.
    pub fn session_vars(&self) -> HashMap<String, String> {
        SESSION_VARS
            .iter()
            .map(|var| {
                let value =
                    self.get(var.section, var.name).unwrap_or(var.default);
                (var.name.to_string(), value.to_string())
            })
            .collect()
    }
}

/// Returns why `name` can't be used as a section or option name, if it
/// can't.
fn check_name(name: &str, forbidden: &[char]) -> Option<&'static str> {
    if name.is_empty() {
        Some("is empty")
    } else if name.trim() != name {
        Some("has leading or trailing whitespace")
    } else if name.contains(['\n', '\r']) {
        Some("contains a line break")
    } else if name.contains(forbidden) {
        Some("contains a reserved character")
    } else {
        None
    }
}

/// Builds the `[autoexec]` section appended to a session configuration: one
/// line per non-blank input line, in order and otherwise verbatim.
pub fn autoexec_section(lines: &str) -> String {
    let mut out = format!("\n[{AUTOEXEC_SECTION}]\n");
    for line in lines.lines().filter(|l| !l.trim().is_empty()) {
        out.push_str(line);
        out.push('\n');
    }

    out
}

/// Owns the locations of the persistent configuration's template and of the
/// ephemeral session configuration.
#[derive(Clone, Debug)]
pub struct ConfigStore {
    template_path: Utf8PathBuf,
    session_path: Utf8PathBuf,
}

impl ConfigStore {
    pub fn new(template_path: Utf8PathBuf, session_path: Utf8PathBuf) -> Self {
        Self { template_path, session_path }
    }

    pub fn template_path(&self) -> &Utf8Path {
        &self.template_path
    }

    pub fn session_path(&self) -> &Utf8Path {
        &self.session_path
    }

    /// Writes a configuration rendered with the default variables to `path`
    /// unless a file already exists there. Returns whether a file was
    /// written.
    pub fn ensure_default(&self, path: &Utf8Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }

        let template = template::load_or_restore(&self.template_path)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(Error::io("creating configuration directory", parent))?;
        }

        tracing::info!(%path, "creating default DOSBox-X configuration");
        let text = template::render(&template, &default_vars());
        std::fs::write(path, text)
            .map_err(Error::io("writing configuration", path))?;

        Ok(true)
    }

    pub fn load(path: &Utf8Path) -> Result<ConfigDocument> {
        let text = std::fs::read_to_string(path)
            .map_err(Error::io("reading configuration", path))?;

        ConfigDocument::parse(&text, path)
    }

    pub fn save(path: &Utf8Path, document: &ConfigDocument) -> Result<()> {
        tracing::debug!(%path, "saving configuration");
        std::fs::write(path, document.to_text())
            .map_err(Error::io("writing configuration", path))
    }

    /// Renders the session configuration for one emulator run from the
    /// persistent configuration at `path` (created with defaults if absent)
    /// and the supplied startup commands, and writes it to the session path,
    /// replacing any file already there.
    pub fn render_session(
        &self,
        path: &Utf8Path,
        autoexec_lines: &str,
    ) -> Result<SessionConfig> {
        self.ensure_default(path)?;
        let persistent = Self::load(path)?;
        let template = template::load_or_restore(&self.template_path)?;

        let mut text = template::render(&template, &persistent.session_vars());
        text.push_str(&autoexec_section(autoexec_lines));

        if let Some(parent) = self.session_path.parent() {
            std::fs::create_dir_all(parent).map_err(Error::io(
                "creating session configuration directory",
                parent,
            ))?;
        }

        std::fs::write(&self.session_path, text).map_err(Error::io(
            "writing session configuration",
            &self.session_path,
        ))?;

        tracing::debug!(path = %self.session_path, "rendered session configuration");
        Ok(SessionConfig { path: self.session_path.clone() })
    }
}

/// A rendered session configuration file. The file is deleted when this
/// value is dropped, so it lives exactly as long as the emulator run that
/// consumes it.
#[derive(Debug)]
pub struct SessionConfig {
    path: Utf8PathBuf,
}

impl SessionConfig {
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl Drop for SessionConfig {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path, "removed session configuration")
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path,
                error = %e,
                "failed to remove session configuration"
            ),
        }
    }
}
