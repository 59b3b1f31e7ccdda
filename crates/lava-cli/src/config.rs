// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Lava configuration.
//!
//! Configuration is loaded from `lava.toml` in the current directory, or
//! from the file passed with `--config`.
//!
//! # Example Configuration
//!
//! ```toml
//! [engine]
//! shortcode_suffix = "_"
//! max_depth = 64
//! cache_capacity = 128
//!
//! [security]
//! enabled_commands = ["WorkflowActivate"]
//!
//! [[shortcodes]]
//! name = "alert"
//! kind = "block"
//! markup = "<div class='alert alert-{{ type }}'>{{ blockContent }}</div>"
//! parameters = { type = "info" }
//!
//! [[scripts]]
//! name = "greet"
//! source = "function execute(a, c) return { Greeting = 'Hi ' .. a.name } end"
//!
//! [[workflow_types]]
//! id = 1
//! guid = "2b2567b6-3c50-4d3f-a5d2-5d5a6b3c8e11"
//! name = "Intake"
//! attribute_keys = ["Reason"]
//! ```

use anyhow::Context;
use lava::{
    Engine, EngineOptions, MemoryWorkflowService, ScriptDefinition, ShortcodeDefinition,
    TagRegistry, WorkflowTypeInfo,
};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Default configuration file name.
pub const CONFIG_FILE: &str = "lava.toml";

/// Main configuration structure loaded from `lava.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Engine options.
    #[serde(default)]
    pub engine: EngineOptions,
    /// Command authorization.
    #[serde(default)]
    pub security: SecurityConfig,
    /// Dynamic shortcodes.
    #[serde(default)]
    pub shortcodes: Vec<ShortcodeDefinition>,
    /// Lua script tags.
    #[serde(default)]
    pub scripts: Vec<ScriptDefinition>,
    /// Workflow types served by the in-memory workflow service.
    #[serde(default)]
    pub workflow_types: Vec<WorkflowTypeInfo>,
}

/// Security configuration.
#[derive(Debug, Default, Deserialize)]
pub struct SecurityConfig {
    /// Commands enabled for every template rendered with this config.
    #[serde(default)]
    pub enabled_commands: Vec<String>,
}

impl Config {
    /// Loads configuration from `path`, or from `lava.toml` in the current
    /// directory when no path is given.
    ///
    /// A missing `lava.toml` yields the default configuration; a missing
    /// explicit path is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config_path = match path {
            Some(path) => path,
            None => {
                let default_path = Path::new(CONFIG_FILE);
                if !default_path.exists() {
                    tracing::debug!("No {} found, using defaults", CONFIG_FILE);
                    return Ok(Config::default());
                }
                default_path
            }
        };

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", config_path.display()))
    }

    /// Parses configuration from TOML text.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Builds an engine with the bundled tags plus the configured shortcodes
    /// and scripts.
    ///
    /// # Errors
    ///
    /// Returns an error if a shortcode or script cannot be registered.
    pub fn build_engine(&self) -> anyhow::Result<Engine> {
        let workflows = self
            .workflow_types
            .iter()
            .cloned()
            .fold(MemoryWorkflowService::new(), MemoryWorkflowService::with_workflow_type);
        let mut registry = TagRegistry::with_defaults(Arc::new(workflows));

        for shortcode in &self.shortcodes {
            let name = shortcode.name.clone();
            shortcode
                .clone()
                .register(&mut registry, &self.engine.shortcode_suffix)
                .with_context(|| format!("Failed to register shortcode '{}'", name))?;
        }

        for script in &self.scripts {
            let name = script.name.clone();
            script
                .clone()
                .register(&mut registry)
                .with_context(|| format!("Failed to register script '{}'", name))?;
        }

        tracing::debug!(tags = ?registry.names(), "Tag registry ready");
        Ok(Engine::with_registry(registry, self.engine.clone()))
    }
}
