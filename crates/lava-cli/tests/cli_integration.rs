// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Integration tests for the render and rewrite commands.

use std::fs;
use std::path::Path;

use tempfile::tempdir;

use lava_cli::commands::render::{render_to_string, RenderOptions};
use lava_cli::commands::rewrite::rewrite_to_string;
use lava_cli::config::Config;

const CONFIG: &str = r#"
[engine]
cache_capacity = 16

[[shortcodes]]
name = "alert"
markup = "<div class='alert-{{ type }}'>{{ blockContent }}</div>"
parameters = { type = "info" }

[[scripts]]
name = "greet"
source = "function execute(a, c) return { Greeting = 'Hi ' .. a.name } end"

[[workflow_types]]
id = 7
guid = "2b2567b6-3c50-4d3f-a5d2-5d5a6b3c8e11"
name = "Intake"
attribute_keys = ["Reason"]
"#;

/// Create a project with a config, a data file and a few templates
fn setup_project(dir: &Path) {
    fs::write(dir.join("lava.toml"), CONFIG).unwrap();
    fs::write(dir.join("data.json"), r#"{ "Person": { "NickName": "Ted" } }"#).unwrap();
    fs::write(dir.join("hello.lava"), "Hello {{ Person.NickName }}!").unwrap();
    fs::write(
        dir.join("alert.lava"),
        "{[ alert type:'danger' ]}Careful {{ Person.NickName }}{[ endalert ]}",
    )
    .unwrap();
    fs::write(
        dir.join("workflow.lava"),
        "{% workflowactivate workflowtype:'Intake' reason:'Visit' %}{{ Workflow.Name }}:{{ Workflow.Attributes.Reason }}{% endworkflowactivate %}",
    )
    .unwrap();
    fs::write(dir.join("greet.lava"), "{% greet name:'Ted' %}[{{ Greeting }}]{% endgreet %}").unwrap();
    fs::write(dir.join("conditions.lava"), "{% if x %}a{% elseif y %}b{% endif %}").unwrap();
}

fn options(dir: &Path, template: &str) -> RenderOptions {
    RenderOptions {
        template: dir.join(template),
        data: Some(dir.join("data.json")),
        ..Default::default()
    }
}

fn load_config(dir: &Path) -> Config {
    Config::load(Some(&dir.join("lava.toml"))).unwrap()
}

#[test]
fn test_render_with_data() {
    let dir = tempdir().unwrap();
    setup_project(dir.path());

    let output = render_to_string(&options(dir.path(), "hello.lava"), &load_config(dir.path())).unwrap();
    assert_eq!(output, "Hello Ted!");
}

#[test]
fn test_render_without_data() {
    let dir = tempdir().unwrap();
    setup_project(dir.path());

    let options = RenderOptions {
        template: dir.path().join("hello.lava"),
        ..Default::default()
    };
    let output = render_to_string(&options, &Config::default()).unwrap();
    assert_eq!(output, "Hello !");
}

#[test]
fn test_render_configured_shortcode() {
    let dir = tempdir().unwrap();
    setup_project(dir.path());

    let output = render_to_string(&options(dir.path(), "alert.lava"), &load_config(dir.path())).unwrap();
    assert_eq!(output, "<div class='alert-danger'>Careful Ted</div>");
}

#[test]
fn test_workflow_requires_enabled_command() {
    let dir = tempdir().unwrap();
    setup_project(dir.path());
    let config = load_config(dir.path());

    let denied = render_to_string(&options(dir.path(), "workflow.lava"), &config).unwrap();
    assert_eq!(
        denied,
        "The Lava command 'WorkflowActivate' is not configured for this template."
    );

    let mut allowed = options(dir.path(), "workflow.lava");
    allowed.enable_commands = vec!["WorkflowActivate".to_string()];
    let output = render_to_string(&allowed, &config).unwrap();
    assert_eq!(output, "Intake:Visit");
}

#[test]
fn test_enabled_commands_from_config() {
    let dir = tempdir().unwrap();
    setup_project(dir.path());
    let config_text = format!("[security]\nenabled_commands = [\"Execute\"]\n{}", CONFIG);
    fs::write(dir.path().join("lava.toml"), config_text).unwrap();

    let output = render_to_string(&options(dir.path(), "greet.lava"), &load_config(dir.path())).unwrap();
    assert_eq!(output, "[Hi Ted]");
}

#[test]
fn test_rewrite_prints_liquid() {
    let dir = tempdir().unwrap();
    setup_project(dir.path());
    let config = load_config(dir.path());

    assert_eq!(
        rewrite_to_string(&dir.path().join("alert.lava"), &config).unwrap(),
        "{% alert_ type:'danger' %}Careful {{ Person.NickName }}{% endalert_ %}"
    );
    assert_eq!(
        rewrite_to_string(&dir.path().join("conditions.lava"), &config).unwrap(),
        "{% if x %}a{% elsif y %}b{% endif %}"
    );
}

#[test]
fn test_missing_explicit_config_is_an_error() {
    let dir = tempdir().unwrap();
    assert!(Config::load(Some(&dir.path().join("missing.toml"))).is_err());
}

#[test]
fn test_data_must_be_an_object() {
    let dir = tempdir().unwrap();
    setup_project(dir.path());
    fs::write(dir.path().join("data.json"), "[1, 2]").unwrap();

    let result = render_to_string(&options(dir.path(), "hello.lava"), &Config::default());
    assert!(result.is_err());
}

#[test]
fn test_parse_error_reports_template() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("broken.lava"), "{% if x %}open").unwrap();

    let options = RenderOptions {
        template: dir.path().join("broken.lava"),
        ..Default::default()
    };
    let err = render_to_string(&options, &Config::default()).unwrap_err();
    assert!(format!("{:#}", err).contains("never closed"), "{:#}", err);
}
