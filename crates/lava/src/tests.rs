// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! End-to-end rendering tests through the engine.

use crate::block::{BlockBody, BlockOutcome, BodyRenderer};
use crate::context::{RenderContext, Visibility};
use crate::engine::{Engine, EngineOptions};
use crate::error::{LavaError, Result};
use crate::markup::ElementAttributes;
use crate::registry::TagRegistry;
use crate::shortcode::{ShortcodeDefinition, ShortcodeKind};
use crate::workflow::{ActivityTypeInfo, MemoryWorkflowService, WorkflowTypeInfo};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const INTAKE_GUID: &str = "2b2567b6-3c50-4d3f-a5d2-5d5a6b3c8e11";

/// Publishes its parameters as `Params` and marks `Echoed` at the root.
#[derive(Default)]
struct EchoBlock {
    calls: AtomicUsize,
}

impl BlockBody for EchoBlock {
    fn display_name(&self) -> &str {
        "Echo"
    }

    fn execute(&self, attributes: &ElementAttributes, _ctx: &RenderContext) -> BlockOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let params: Map<String, Value> = attributes
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();
        BlockOutcome::completed().with_output("Params", Value::Object(params))
    }

    fn render(&self, ctx: &mut RenderContext, renderer: &dyn BodyRenderer, out: &mut String) -> Result<()> {
        ctx.set_merge_field("Echoed", json!(true), Visibility::Root);
        renderer.render_body(ctx, out)
    }
}

struct Fixture {
    engine: Engine,
    echo: Arc<EchoBlock>,
    workflows: Arc<MemoryWorkflowService>,
}

fn fixture() -> Fixture {
    let workflows = Arc::new(
        MemoryWorkflowService::new().with_workflow_type(
            WorkflowTypeInfo::new(7, INTAKE_GUID, "Intake")
                .with_attribute_keys(["Reason"])
                .with_activity(ActivityTypeInfo::new(70, "", "Review")),
        ),
    );
    let echo = Arc::new(EchoBlock::default());

    let mut registry = TagRegistry::with_defaults(workflows.clone());
    registry.register_block("echo", echo.clone()).unwrap();
    ShortcodeDefinition::new(
        "shortcodetest",
        "{{ fontname }}/{{ fontsize }}/{{ fontbold }}:{{ blockContent }}",
    )
    .with_parameter("fontbold", "false")
    .register(&mut registry, "_")
    .unwrap();
    ShortcodeDefinition::new("badge", "<b>{{ text }}</b>")
        .with_kind(ShortcodeKind::Inline)
        .register(&mut registry, "_")
        .unwrap();

    Fixture {
        engine: Engine::with_registry(registry, EngineOptions::default()),
        echo,
        workflows,
    }
}

fn all_enabled(data: Value) -> RenderContext {
    RenderContext::from_json(data).unwrap().with_enabled_commands(["All"])
}

fn render(fixture: &Fixture, source: &str, ctx: &mut RenderContext) -> String {
    fixture.engine.render_source(source, ctx).unwrap()
}

#[test]
fn test_parameter_keys_ignore_case() {
    let f = fixture();
    let out = render(
        &f,
        "{% echo param1:'One' PARAM2:'Two' %}{{ Params.param1 }}-{{ Params.param2 }}{% endecho %}",
        &mut all_enabled(json!({})),
    );
    assert_eq!(out, "One-Two");
}

#[test]
fn test_nested_expression_in_quoted_parameter() {
    let f = fixture();
    let out = render(
        &f,
        r#"{% echo where:'X == "{{ 'Blog Posts' }}"' iterator:'items' %}{{ Params.where }}|{{ Params.iterator }}{% endecho %}"#,
        &mut all_enabled(json!({})),
    );
    assert_eq!(out, r#"X == "Blog Posts"|items"#);
}

#[test]
fn test_parameter_values_see_enclosing_scope() {
    let f = fixture();
    let out = render(
        &f,
        "{% echo who:'{{ Person.NickName }}' %}{{ Params.who }}{% endecho %}",
        &mut all_enabled(json!({ "Person": { "NickName": "Ted" } })),
    );
    assert_eq!(out, "Ted");
}

#[test]
fn test_empty_parameter_values() {
    let f = fixture();
    let out = render(
        &f,
        "{% echo param1:'' param2: %}[{{ Params.param1 }}][{{ Params.param2 }}]\
         {% if Params contains 'param2' %}present{% endif %}{% endecho %}",
        &mut all_enabled(json!({})),
    );
    assert_eq!(out, "[][]present");
}

#[test]
fn test_elseif_in_string_is_untouched() {
    let f = fixture();
    let source = "{% if Word == 'elseif' %}literal{% elseif Word == 'x' %}x{% else %}other{% endif %}";

    assert_eq!(render(&f, source, &mut all_enabled(json!({ "Word": "elseif" }))), "literal");
    assert_eq!(render(&f, source, &mut all_enabled(json!({ "Word": "x" }))), "x");
    assert_eq!(render(&f, source, &mut all_enabled(json!({}))), "other");
}

#[test]
fn test_block_shortcode_with_nested_parameters() {
    let f = fixture();
    let out = render(
        &f,
        "{[ shortcodetest fontname:'Arial' fontsize:'{{ fontsize }}' fontbold:'true' ]}Body {{ fontsize }}{[ endshortcodetest ]}",
        &mut RenderContext::from_json(json!({ "fontsize": 12 })).unwrap(),
    );
    assert_eq!(out, "Arial/12/true:Body 12");
}

#[test]
fn test_block_shortcode_parameter_defaults() {
    let f = fixture();
    let out = render(
        &f,
        "{[ shortcodetest fontname:'Serif' ]}x{[ endshortcodetest ]}",
        &mut RenderContext::new(),
    );
    assert_eq!(out, "Serif//false:x");
}

#[test]
fn test_inline_shortcode() {
    let f = fixture();
    let out = render(&f, "A {[ badge text:'new' ]} B", &mut RenderContext::new());
    assert_eq!(out, "A <b>new</b> B");
}

#[test]
fn test_unterminated_shortcode_passes_through() {
    let f = fixture();
    let out = render(&f, "before {[ badge text:'x' after", &mut RenderContext::new());
    assert_eq!(out, "before {[ badge text:'x' after");
}

#[test]
fn test_scope_containment() {
    let f = fixture();
    let mut ctx = all_enabled(json!({ "X": 1 }));
    let out = render(
        &f,
        "{% echo %}{% assign X = 2 %}{{ X }}{% endecho %}{{ X }}{{ Echoed }}",
        &mut ctx,
    );
    assert_eq!(out, "21true");
    assert_eq!(ctx.get_merge_field("X"), Some(&json!(1)));
    assert_eq!(ctx.get_merge_field("Params"), None);
    assert_eq!(ctx.get_merge_field("Echoed"), Some(&json!(true)));
    assert_eq!(ctx.depth(), 1);
}

#[test]
fn test_nested_blocks_of_same_type_restore_scope() {
    let f = fixture();
    let out = render(
        &f,
        "{% echo name:'outer' %}{{ Params.name }}\
         {% echo name:'inner' %}{{ Params.name }}{% endecho %}\
         {{ Params.name }}{% endecho %}",
        &mut all_enabled(json!({})),
    );
    assert_eq!(out, "outerinnerouter");
    assert_eq!(f.echo.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_workflow_requires_type_or_id() {
    let f = fixture();
    let out = render(
        &f,
        "{% workflowactivate workflowname:'x' %}{{ Error }}[{{ Workflow }}][{{ Activity }}]{% endworkflowactivate %}",
        &mut all_enabled(json!({})),
    );
    assert_eq!(out, "Must specify one of WorkflowType or WorkflowId.[][]");
    assert!(f.workflows.workflows().is_empty());
}

#[test]
fn test_workflow_activation_publishes_outputs() {
    let f = fixture();
    let mut ctx = RenderContext::from_json(json!({ "Why": "walk-in" }))
        .unwrap()
        .with_enabled_commands(["workflowactivate"]);
    let out = render(
        &f,
        "{% workflowactivate workflowtype:'Intake' activitytype:'Review' reason:'{{ Why }}' %}\
         {{ Workflow.Name }}/{{ Activity.Name }}{{ Error }}{% endworkflowactivate %}[{{ Workflow }}]",
        &mut ctx,
    );
    assert_eq!(out, "Intake/Review[]");
    assert_eq!(f.workflows.workflows().len(), 1);
}

#[test]
fn test_workflow_attributes_land_on_workflow() {
    let f = fixture();
    render(
        &f,
        "{% workflowactivate workflowtype:7 REASON:'{{ Why }}' Other:'x' %}{% endworkflowactivate %}",
        &mut all_enabled(json!({ "Why": "walk-in" })),
    );
    let workflow = &f.workflows.workflows()[0];
    assert_eq!(workflow.attributes.get("Reason").map(String::as_str), Some("walk-in"));
    assert_eq!(workflow.attributes.len(), 1);
}

#[test]
fn test_workflow_identifier_fallback() {
    let f = fixture();
    for identifier in [INTAKE_GUID.to_uppercase(), "7".to_string(), "intake".to_string()] {
        let out = render(
            &f,
            &format!(
                "{{% workflowactivate workflowtype:'{}' %}}{{{{ Workflow.WorkflowTypeId }}}}{{{{ Error }}}}{{% endworkflowactivate %}}",
                identifier
            ),
            &mut all_enabled(json!({})),
        );
        assert_eq!(out, "7", "identifier {}", identifier);
    }
}

#[test]
fn test_denied_block_never_runs() {
    let f = fixture();
    let mut ctx = RenderContext::from_json(json!({ "Secret": "s3cr3t" })).unwrap();
    let out = render(&f, "a{% echo x:'1' %}{{ Secret }}{% endecho %}b", &mut ctx);

    assert_eq!(out, "aThe Lava command 'Echo' is not configured for this template.b");
    assert_eq!(f.echo.calls.load(Ordering::SeqCst), 0);
    assert_eq!(ctx.get_merge_field("Echoed"), None);
}

#[test]
fn test_denial_does_not_abort_later_content() {
    let f = fixture();
    let mut ctx = RenderContext::new().with_enabled_commands(["Echo"]);
    let out = render(
        &f,
        "{% workflowactivate workflowtype:'Intake' %}x{% endworkflowactivate %}|{% echo %}ok{% endecho %}",
        &mut ctx,
    );
    assert_eq!(
        out,
        "The Lava command 'WorkflowActivate' is not configured for this template.|ok"
    );
}

#[test]
fn test_compile_errors_propagate_with_position() {
    let f = fixture();
    let err = f
        .engine
        .render_source("ok\n{% echo %}never closed", &mut all_enabled(json!({})))
        .unwrap_err();
    match err {
        LavaError::ParseError { line, column, source_context, .. } => {
            assert_eq!((line, column), (2, 1));
            assert!(source_context.unwrap().format_snippet().contains("{% echo %}"));
        }
        other => panic!("Expected ParseError, got {:?}", other),
    }
}

#[test]
fn test_quotes_inside_nested_output_in_tag_markup() {
    let f = fixture();
    let out = render(
        &f,
        r#"{% echo title:'{{ "it's" }}' %}[{{ Params.title }}]{% endecho %} after"#,
        &mut all_enabled(json!({})),
    );
    assert_eq!(out, "[it's] after");
}

#[test]
fn test_quotes_inside_nested_output_in_shortcode_markup() {
    let f = fixture();
    let out = render(
        &f,
        r#"{[ badge text:'{{ "it's" }}' ]} then {[ badge text:'b' ]}"#,
        &mut RenderContext::new(),
    );
    assert_eq!(out, "<b>it's</b> then <b>b</b>");
}

#[test]
fn test_apostrophe_in_unquoted_value() {
    let f = fixture();
    let out = render(
        &f,
        "{% echo note:O'Brien %}{{ Params.note }}{% endecho %}|{[ badge text:'z' ]}",
        &mut all_enabled(json!({})),
    );
    assert_eq!(out, "O'Brien|<b>z</b>");
}

#[test]
fn test_unterminated_quote_keeps_rest_of_page() {
    let f = fixture();
    let out = render(
        &f,
        "{% echo b:'never closed %}[{{ Params.b }}]{% endecho %} rest of page",
        &mut all_enabled(json!({})),
    );
    assert_eq!(out, "[never closed] rest of page");
}

#[test]
fn test_pipe_inside_string_literals() {
    let f = fixture();
    let out = render(
        &f,
        "{% assign sep = ' | ' %}a{{ sep }}b {{ 'a|b' }}",
        &mut RenderContext::new(),
    );
    assert_eq!(out, "a | b a|b");
}

#[test]
fn test_filters_are_rejected_at_compile_time() {
    let f = fixture();
    let result = f.engine.render_source("{{ Name | upcase }}", &mut RenderContext::new());
    assert!(matches!(result, Err(LavaError::ParseError { .. })));
}

#[test]
fn test_nesting_limit_is_contained() {
    let workflows = Arc::new(MemoryWorkflowService::new());
    let mut registry = TagRegistry::with_defaults(workflows);
    registry.register_block("echo", Arc::new(EchoBlock::default())).unwrap();
    let engine = Engine::with_registry(
        registry,
        EngineOptions {
            max_depth: 2,
            ..EngineOptions::default()
        },
    );

    let out = engine
        .render_source(
            "{% echo %}1{% echo %}2{% echo %}3{% endecho %}{% endecho %}{% endecho %}!",
            &mut all_enabled(json!({})),
        )
        .unwrap();
    assert!(out.starts_with("12Lava error: 'Echo' exceeded the maximum nesting depth of 2."));
    assert!(out.ends_with('!'));
}

#[cfg(feature = "scripting")]
mod scripting {
    use super::*;
    use crate::script::ScriptDefinition;

    fn engine() -> Engine {
        let mut registry = TagRegistry::new();
        let definition: ScriptDefinition = serde_json::from_value(json!({
            "name": "greet",
            "source": "function execute(a, c) return { Greeting = 'Hi ' .. (a.name or c.Name) } end"
        }))
        .unwrap();
        definition.register(&mut registry).unwrap();
        Engine::with_registry(registry, EngineOptions::default())
    }

    #[test]
    fn test_script_requires_execute() {
        let engine = engine();
        let source = "{% greet %}{{ Greeting }}{% endgreet %}";

        let mut denied = RenderContext::from_json(json!({ "Name": "Ted" })).unwrap();
        assert_eq!(
            engine.render_source(source, &mut denied).unwrap(),
            "The Lava command 'greet' is not configured for this template."
        );

        let mut allowed = RenderContext::from_json(json!({ "Name": "Ted" }))
            .unwrap()
            .with_enabled_commands(["Execute"]);
        assert_eq!(engine.render_source(source, &mut allowed).unwrap(), "Hi Ted");
    }

    #[test]
    fn test_script_errors_render_as_error_field() {
        let mut registry = TagRegistry::new();
        ScriptDefinition {
            name: "explode".to_string(),
            source: "function execute() error('kaboom') end".to_string(),
            kind: crate::script::ScriptKind::Block,
            permission_key: "Execute".to_string(),
        }
        .register(&mut registry)
        .unwrap();
        let engine = Engine::with_registry(registry, EngineOptions::default());

        let out = engine
            .render_source(
                "{% explode %}{% if Error contains 'kaboom' %}caught{% endif %}{% endexplode %}",
                &mut all_enabled(json!({})),
            )
            .unwrap();
        assert_eq!(out, "caught");
    }
}
