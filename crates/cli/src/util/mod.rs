use std::fs;
use std::path::Path;

use anyhow::Context;
use owo_colors::{OwoColorize, Stream};
use xforms_runtime::Form;

pub type CliResult<T> = anyhow::Result<T>;

/// Load and materialize a JSON form definition.
pub fn load_form(path: &Path) -> CliResult<Form> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read form definition {}", path.display()))?;
    let form = Form::from_json(&text)
        .with_context(|| format!("failed to load form definition {}", path.display()))?;
    Ok(form)
}

pub fn colorize_reference(reference: &str) -> String {
    reference
        .if_supports_color(Stream::Stdout, |text| text.bold().fg_rgb::<79, 166, 255>().to_string())
        .to_string()
}

pub fn colorize_value(value: &str) -> String {
    value
        .if_supports_color(Stream::Stdout, |text| text.fg_rgb::<136, 192, 74>().to_string())
        .to_string()
}

pub fn colorize_flag(flag: &str) -> String {
    flag.if_supports_color(Stream::Stdout, |text| text.dimmed().to_string()).to_string()
}

pub fn colorize_error(message: &str) -> String {
    message.if_supports_color(Stream::Stdout, |text| text.fg_rgb::<241, 96, 96>().to_string()).to_string()
}
