// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! Lava CLI library.
//!
//! This crate provides the command-line interface for the Lava templating
//! core.
//!
//! # Usage
//!
//! This crate is primarily used through the `lava` binary:
//!
//! ```bash
//! lava render page.lava --data data.json --enable-command WorkflowActivate
//! lava rewrite page.lava
//! ```
//!
//! # Configuration
//!
//! Engine options, enabled commands, shortcodes, script tags and workflow
//! types are configured via `lava.toml`.

/// CLI commands (render, rewrite).
pub mod commands;
/// Configuration from `lava.toml`.
pub mod config;
