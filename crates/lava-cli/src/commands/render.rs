// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Render command: renders a template against JSON merge fields.

use super::read_template;
use crate::config::Config;
use anyhow::Context;
use lava::RenderContext;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Inputs of a render.
#[derive(Debug, Default)]
pub struct RenderOptions {
    /// Template file.
    pub template: PathBuf,
    /// JSON object of root merge fields.
    pub data: Option<PathBuf>,
    /// Commands enabled in addition to those in the configuration.
    pub enable_commands: Vec<String>,
    /// Write the output here instead of stdout.
    pub output: Option<PathBuf>,
}

fn load_data(path: Option<&Path>) -> anyhow::Result<Value> {
    let Some(path) = path else {
        return Ok(Value::Object(Default::default()));
    };
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read data file {}", path.display()))?;
    let data: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse data file {}", path.display()))?;
    if !data.is_object() {
        anyhow::bail!("Data file {} must contain a JSON object", path.display());
    }
    Ok(data)
}

/// Renders the template described by `options`.
pub fn render_to_string(options: &RenderOptions, config: &Config) -> anyhow::Result<String> {
    let started = Instant::now();
    let engine = config.build_engine()?;
    let source = read_template(&options.template)?;

    let commands = config
        .security
        .enabled_commands
        .iter()
        .chain(&options.enable_commands)
        .cloned();
    let mut ctx = RenderContext::from_json(load_data(options.data.as_deref())?)?
        .with_enabled_commands(commands);

    let output = engine
        .render_source(&source, &mut ctx)
        .with_context(|| format!("Failed to render {}", options.template.display()))?;

    tracing::info!(
        template = %options.template.display(),
        elapsed = ?started.elapsed(),
        "Rendered template"
    );
    Ok(output)
}

/// Runs the render command.
pub fn run(options: RenderOptions, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;
    let output = render_to_string(&options, &config)?;

    match &options.output {
        Some(path) => fs::write(path, output)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => print!("{}", output),
    }
    Ok(())
}
