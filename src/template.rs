// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Placeholder substitution for DOSBox-X configuration templates.
//!
//! Templates refer to variables as `${name}`. Rendering replaces every
//! placeholder whose name appears in the supplied variables and leaves every
//! other placeholder (and any malformed `${` sequence) exactly as written.

use std::collections::HashMap;

use camino::Utf8Path;

use crate::error::{Error, Result};

/// The template written out when none exists in the templates directory.
pub const BUILTIN_TEMPLATE: &str = r#"# DOSBox-X configuration file for Windows 9x Manager

[sdl]
fullscreen=false
fulldouble=true
fullresolution=desktop
windowresolution=${windowresolution}
output=${output}
autolock=true

[dosbox]
language=
machine=${machine}
captures=capture
memsize=${memsize}

[render]
frameskip=0
aspect=true
scaler=normal3x

[cpu]
core=dynamic
cputype=pentium_mmx
cycles=${cycles}
cycleup=500
cycledown=500

[mixer]
nosound=false
rate=44100
blocksize=1024
prebuffer=40

[midi]
mpu401=intelligent
mididevice=default

[sblaster]
sbtype=sb16
sbbase=220
irq=7
dma=1
hdma=5
sbmixer=true
oplmode=auto
oplemu=default
oplrate=44100

[gus]
gus=false
gusrate=44100
gusbase=240
irq1=5
dma1=1

[speaker]
pcspeaker=true
pcrate=44100
tandy=auto
tandyrate=44100
disney=true

[dos]
xms=true
ems=true
umb=true
keyboardlayout=auto

[ipx]
ipx=false
"#;

/// Renders `template` in a single pass. Substituted values are never
/// themselves scanned for placeholders.
pub fn render(template: &str, variables: &HashMap<String, String>) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];

        let Some(end) = after_open.find('}') else {
            // Unterminated placeholder; the remainder is literal text.
            rest = &rest[start..];
            break;
        };

        let name = &after_open[..end];
        match variables.get(name) {
            Some(value) => output.push_str(value),
            None => output.push_str(&rest[start..start + 2 + end + 1]),
        }

        rest = &after_open[end + 1..];
    }

    output.push_str(rest);
    output
}

/// Reads the template at `path`.
pub fn load(path: &Utf8Path) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(Error::TemplateMissing { path: path.to_owned() })
        }
        Err(e) => Err(Error::io("reading template", path)(e)),
    }
}

/// Writes the built-in template to `path`, creating its parent directory if
/// needed.
pub fn write_builtin(path: &Utf8Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(Error::io("creating templates directory", parent))?;
    }

    tracing::info!(%path, "writing built-in configuration template");
    std::fs::write(path, BUILTIN_TEMPLATE)
        .map_err(Error::io("writing template", path))
}

/// Reads the template at `path`, regenerating the built-in template first if
/// the file is missing.
pub fn load_or_restore(path: &Utf8Path) -> Result<String> {
    match load(path) {
        Err(Error::TemplateMissing { .. }) => {
            tracing::warn!(%path, "template missing, restoring built-in default");
            write_builtin(path)?;
            Ok(BUILTIN_TEMPLATE.to_string())
        }
        other => other,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn substitutes_known_and_keeps_unknown() {
        let out = render(
            "memsize=${memsize}\nscaler=${scaler}\n",
            &vars(&[("memsize", "64")]),
        );

        assert_eq!(out, "memsize=64\nscaler=${scaler}\n");
    }

    #[test]
    fn repeated_keys_all_substituted() {
        let out =
            render("${a}-${a}-${b}${a}", &vars(&[("a", "x"), ("b", "yy")]));
        assert_eq!(out, "x-x-yyx");
    }

    #[test]
    fn single_pass_only() {
        let out = render(
            "cycles=${cycles}",
            &vars(&[("cycles", "${memsize}"), ("memsize", "64")]),
        );
        assert_eq!(out, "cycles=${memsize}");
    }

    #[test]
    fn malformed_placeholders_pass_through() {
        let v = vars(&[("a", "1")]);
        assert_eq!(render("cost $5 and ${a", &v), "cost $5 and ${a");
        assert_eq!(render("$a ${} $${a}", &v), "$a ${} $1");
        assert_eq!(render("", &v), "");
    }

    #[test]
    fn unterminated_placeholder_after_known_key() {
        let v = vars(&[("a", "1"), ("b", "2")]);
        assert_eq!(render("${a}${b", &v), "1${b");
        assert_eq!(render("x=${a} y=${b} z=${", &v), "x=1 y=2 z=${");
        assert_eq!(render("${", &v), "${");
    }

    #[test]
    fn builtin_template_renders_all_session_variables() {
        let v = vars(&[
            ("memsize", "64"),
            ("cycles", "max 80% limit 33000"),
            ("machine", "svga_s3"),
            ("windowresolution", "1024x768"),
            ("output", "opengl"),
        ]);

        let out = render(BUILTIN_TEMPLATE, &v);
        assert!(!out.contains("${"));
        assert!(out.contains("cycles=max 80% limit 33000\n"));
        assert!(out.contains("windowresolution=1024x768\n"));
    }

    #[test]
    fn load_or_restore_recreates_missing_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8Path::from_path(dir.path())
            .unwrap()
            .join("templates")
            .join("dosbox_template.conf");

        assert!(matches!(load(&path), Err(Error::TemplateMissing { .. })));
        let text = load_or_restore(&path).unwrap();
        assert_eq!(text, BUILTIN_TEMPLATE);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), BUILTIN_TEMPLATE);
    }
}
