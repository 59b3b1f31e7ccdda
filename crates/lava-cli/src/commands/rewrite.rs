// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Rewrite command: prints a template after Lava to Liquid rewriting.

use super::read_template;
use crate::config::Config;
use lava::rewrite_source;
use std::path::Path;

/// Rewrites `template` using the shortcode suffix from the configuration.
pub fn rewrite_to_string(template: &Path, config: &Config) -> anyhow::Result<String> {
    let source = read_template(template)?;
    Ok(rewrite_source(&source, &config.engine.shortcode_suffix))
}

/// Runs the rewrite command.
pub fn run(template: &Path, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;
    print!("{}", rewrite_to_string(template, &config)?);
    Ok(())
}
