//! CLI handlers for `config` subcommands.

use crate::common::config::{config_path, AppConfig};
use anyhow::{bail, Context, Result};
use std::fs;
use std::io::{BufRead, IsTerminal, Write};
use std::path::Path;
use uuid::Uuid;

fn defaults_toml() -> Result<String> {
    toml::to_string_pretty(&AppConfig::default()).context("Failed to serialize default config")
}

/// Print resolved config file path.
pub fn run_config_path() -> Result<()> {
    let mut output = std::io::stdout().lock();
    writeln!(output, "{}", config_path().display())?;
    Ok(())
}

/// Print config file contents, or the effective defaults when no file exists.
pub fn run_config_show() -> Result<()> {
    let mut output = std::io::stdout().lock();
    let mut err_output = std::io::stderr().lock();
    show_config_with_io(&config_path(), &mut output, &mut err_output)
}

/// Reset config to defaults (with confirmation).
pub fn run_config_reset(yes: bool) -> Result<bool> {
    let mut input = std::io::stdin().lock();
    let mut output = std::io::stdout().lock();
    let interactive = std::io::stdin().is_terminal();
    reset_config_with_io(&config_path(), yes, interactive, &mut input, &mut output)
}

fn show_config_with_io(path: &Path, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<()> {
    if path.exists() {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        stdout.write_all(text.as_bytes())?;
        return Ok(());
    }

    writeln!(stderr, "No config file found at {}", path.display())?;
    writeln!(stderr, "Effective defaults:")?;
    stdout.write_all(defaults_toml()?.as_bytes())?;
    Ok(())
}

fn reset_config_with_io(
    path: &Path,
    yes: bool,
    interactive: bool,
    input: &mut dyn BufRead,
    output: &mut dyn Write,
) -> Result<bool> {
    if !yes {
        if !interactive {
            bail!("Refusing to reset config in non-interactive mode. Use --yes");
        }

        write!(output, "Overwrite {} with defaults? [y/N]: ", path.display())?;
        output.flush()?;

        let mut response = String::new();
        input.read_line(&mut response)?;
        if !matches!(response.trim().to_ascii_lowercase().as_str(), "y" | "yes") {
            writeln!(output, "Reset cancelled.")?;
            return Ok(false);
        }
    }

    replace_file(path, &defaults_toml()?)?;
    writeln!(output, "Config reset to defaults: {}", path.display())?;
    Ok(true)
}

/// Write to a sibling temp file then rename over the target.
fn replace_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
    }

    let base_name = path
        .file_name()
        .and_then(|x| x.to_str())
        .unwrap_or("config.toml");
    let tmp_path = path.with_file_name(format!(".{base_name}.{}.tmp", Uuid::new_v4()));

    fs::write(&tmp_path, contents)
        .with_context(|| format!("Failed to write temporary file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to replace config file {}", path.display()))?;
    Ok(())
}
