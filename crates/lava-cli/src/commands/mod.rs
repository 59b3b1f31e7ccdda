// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! CLI command implementations.
//!
//! - `render`: Render a template against JSON merge fields
//! - `rewrite`: Print the Liquid form of a Lava template

/// Template render command.
pub mod render;
/// Lava to Liquid rewrite command.
pub mod rewrite;

use anyhow::Context;
use std::fs;
use std::path::Path;

fn read_template(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read template {}", path.display()))
}
