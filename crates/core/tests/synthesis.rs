//! End-to-end synthesis scenarios.

use std::collections::BTreeMap;

use serde_json::{json, Value};
use stratus_core::{
    App, AppConfig, CoreError, Environment, MissingContext, NameValidator, PropValue,
};

/// Two stacks: plain resources in the first, a nested construct with two
/// resources (one context-dependent) in the second.
fn sample_app(context_overrides: BTreeMap<String, Value>) -> App {
    let mut app = App::new(AppConfig {
        context_overrides,
        version_reporting: false,
        ..Default::default()
    });
    let root = app.root();

    let stack1 = app
        .add_stack(root, "stack1", Environment::new("12345", "us-east-1"))
        .unwrap();
    app.add_resource(
        stack1,
        "s1c1",
        "DummyResource",
        Some(PropValue::from_json(json!({ "Prop1": "Prop1" }))),
    )
    .unwrap();
    let r2 = app
        .add_resource(
            stack1,
            "s1c2",
            "DummyResource",
            Some(PropValue::from_json(json!({ "Foo": 123 }))),
        )
        .unwrap();

    let stack2 = app.add_stack(root, "stack2", Environment::unresolved()).unwrap();
    app.add_resource(
        stack2,
        "s2c1",
        "DummyResource",
        Some(PropValue::from_json(json!({ "Prog2": "Prog2" }))),
    )
    .unwrap();
    let c1 = app.add_construct(stack2, "s1c2").unwrap();
    app.add_resource(c1, "r1", "ResourceType1", None).unwrap();
    app.add_resource(
        c1,
        "r2",
        "ResourceType2",
        Some(PropValue::map([("FromContext", PropValue::context("ctx1"))])),
    )
    .unwrap();

    app.add_metadata(stack1, "meta", json!(111));
    app.add_warning(r2, "warning1");
    app.add_warning(r2, "warning2");
    app.add_metadata(c1, "meta", json!({ "key": "value" }));
    app.add_metadata(root, "applevel", json!(123));

    app
}

#[test]
fn synthesizes_all_stacks_with_verbatim_templates() {
    let assembly = sample_app(BTreeMap::new()).synth().unwrap();

    assert_eq!(assembly.manifest.stacks.len(), 2);

    let stack1 = &assembly.manifest.stacks[0];
    assert_eq!(stack1.name, "stack1");
    assert_eq!(stack1.environment.account, "12345");
    assert_eq!(stack1.environment.region, "us-east-1");
    assert_eq!(stack1.environment.name, "aws://12345/us-east-1");
    assert_eq!(
        serde_json::to_value(&assembly.templates["stack1"]).unwrap(),
        json!({
            "Resources": {
                "s1c1": { "Type": "DummyResource", "Properties": { "Prop1": "Prop1" } },
                "s1c2": { "Type": "DummyResource", "Properties": { "Foo": 123 } }
            }
        })
    );

    let stack2 = &assembly.manifest.stacks[1];
    assert_eq!(stack2.name, "stack2");
    assert_eq!(stack2.environment.name, "aws://unknown-account/unknown-region");
    assert_eq!(
        serde_json::to_value(&assembly.templates["stack2"]).unwrap(),
        json!({
            "Resources": {
                "s2c1": { "Type": "DummyResource", "Properties": { "Prog2": "Prog2" } },
                "s1c2r10E2D08E9": { "Type": "ResourceType1" },
                "s1c2r2B38C28C5": { "Type": "ResourceType2" }
            }
        })
    );
}

#[test]
fn manifest_metadata_maps_paths_to_entries() {
    let assembly = sample_app(BTreeMap::new()).synth().unwrap();

    assert_eq!(
        serde_json::to_value(&assembly.manifest.metadata).unwrap(),
        json!({
            "/": [{ "type": "applevel", "data": 123 }],
            "/stack1": [{ "type": "meta", "data": 111 }],
            "/stack1/s1c1": [{ "type": "stratus:logicalId", "data": "s1c1" }],
            "/stack1/s1c2": [
                { "type": "stratus:logicalId", "data": "s1c2" },
                { "type": "stratus:warning", "data": "warning1" },
                { "type": "stratus:warning", "data": "warning2" }
            ],
            "/stack2/s1c2": [{ "type": "meta", "data": { "key": "value" } }],
            "/stack2/s1c2/r1": [{ "type": "stratus:logicalId", "data": "s1c2r10E2D08E9" }],
            "/stack2/s1c2/r2": [{ "type": "stratus:logicalId", "data": "s1c2r2B38C28C5" }],
            "/stack2/s2c1": [{ "type": "stratus:logicalId", "data": "s2c1" }]
        })
    );
}

#[test]
fn injected_context_flows_into_resolution() {
    let overrides = BTreeMap::from([("ctx1".to_string(), json!("HELLO"))]);
    let assembly = sample_app(overrides).synth().unwrap();

    let stack2 = serde_json::to_value(&assembly.templates["stack2"]).unwrap();
    assert_eq!(
        stack2["Resources"]["s1c2r2B38C28C5"],
        json!({ "Type": "ResourceType2", "Properties": { "FromContext": "HELLO" } })
    );
}

#[test]
fn synthesizing_twice_is_byte_identical() {
    let app = sample_app(BTreeMap::new());
    let first = app.synth().unwrap();
    let second = app.synth().unwrap();

    assert_eq!(
        serde_json::to_string(&first.manifest).unwrap(),
        serde_json::to_string(&second.manifest).unwrap()
    );
    for (name, template) in &first.templates {
        assert_eq!(
            serde_json::to_string(template).unwrap(),
            serde_json::to_string(&second.templates[name]).unwrap()
        );
    }
}

#[test]
fn validation_failures_abort_synthesis_with_every_error() {
    let mut app = App::new(AppConfig::default());
    let root = app.root();
    let parent = app.add_stack(root, "Parent", Environment::unresolved()).unwrap();
    for id in ["C1", "C2"] {
        let child = app.add_construct(parent, id).unwrap();
        let message = format!("Error from {id}");
        app.add_validation(child, Box::new(move || vec![message.clone()]));
    }

    let err = app.synth().unwrap_err();
    let CoreError::Validation { failures } = &err else {
        panic!("expected validation error, got {err}");
    };
    assert_eq!(failures.len(), 2);

    let rendered = err.to_string();
    assert!(rendered.contains("Validation failed with the following errors:"));
    assert!(rendered.contains("[Parent/C1] Error from C1"));
    assert!(rendered.contains("[Parent/C2] Error from C2"));
}

#[test]
fn name_constraint_violations_participate_in_aggregation() {
    let mut app = App::new(AppConfig::default());
    let root = app.root();
    let stack = app.add_stack(root, "s1", Environment::unresolved()).unwrap();
    let group = app.add_construct(stack, "group").unwrap();
    app.add_validation(
        group,
        Box::new(NameValidator::new("Deployment group", "my group", 100)),
    );

    let err = app.synth().unwrap_err();
    let rendered = err.to_string();
    assert!(rendered.contains("[s1/group]"));
    assert!(rendered.contains("\"my group\""));
    assert!(rendered.contains("letters (a-z, A-Z)"));
}

#[test]
fn missing_context_requests_pass_through_verbatim() {
    let mut app = App::new(AppConfig::default());
    let root = app.root();
    let stack = app.add_stack(root, "MyStack", Environment::unresolved()).unwrap();

    app.report_missing_context(
        stack,
        MissingContext {
            key: "missing-context-key".to_string(),
            provider: "fake".to_string(),
            props: BTreeMap::from([
                ("account".to_string(), json!("12345689012")),
                ("region".to_string(), json!("ab-north-1")),
            ]),
        },
    )
    .unwrap();
    app.report_missing_context(
        stack,
        MissingContext {
            key: "missing-context-key-2".to_string(),
            provider: "fake2".to_string(),
            props: BTreeMap::from([
                ("foo".to_string(), json!("bar")),
                ("account".to_string(), json!("12345689012")),
                ("region".to_string(), json!("ab-south-1")),
            ]),
        },
    )
    .unwrap();

    // Missing context is a request, not a failure.
    let assembly = app.synth().unwrap();
    assert_eq!(
        serde_json::to_value(&assembly.manifest.missing).unwrap(),
        json!([
            {
                "key": "missing-context-key",
                "provider": "fake",
                "props": { "account": "12345689012", "region": "ab-north-1" }
            },
            {
                "key": "missing-context-key-2",
                "provider": "fake2",
                "props": { "account": "12345689012", "foo": "bar", "region": "ab-south-1" }
            }
        ])
    );
}

#[test]
fn nested_stacks_synthesize_as_separate_artifacts() {
    let mut app = App::new(AppConfig {
        version_reporting: false,
        ..Default::default()
    });
    let root = app.root();

    let top = app.add_stack(root, "Stack", Environment::unresolved()).unwrap();
    let top_res = app
        .add_resource(top, "Res", "Demo::Top::Resource", None)
        .unwrap();
    let bottom = app.add_stack(top_res, "Stack", Environment::unresolved()).unwrap();
    app.add_resource(bottom, "Res", "Demo::Bottom::Resource", None)
        .unwrap();

    let assembly = app.synth().unwrap();
    let names: Vec<&str> = assembly
        .manifest
        .stacks
        .iter()
        .map(|s| s.name.as_str())
        .collect();
    // SHA-256("Stack/Res/Stack") starts with bda50055.
    assert_eq!(names, vec!["Stack", "StackResStackBDA50055"]);

    assert_eq!(
        serde_json::to_value(&assembly.templates["Stack"]).unwrap(),
        json!({ "Resources": { "Res": { "Type": "Demo::Top::Resource" } } })
    );
    assert_eq!(
        serde_json::to_value(&assembly.templates["StackResStackBDA50055"]).unwrap(),
        json!({ "Resources": { "Res": { "Type": "Demo::Bottom::Resource" } } })
    );
}

#[test]
fn cross_stack_references_compile_to_exports_and_imports() {
    let mut app = App::new(AppConfig {
        version_reporting: false,
        ..Default::default()
    });
    let root = app.root();

    let producer = app.add_stack(root, "producer", Environment::unresolved()).unwrap();
    app.add_resource(producer, "bucket", "Demo::Bucket", None).unwrap();

    let consumer = app.add_stack(root, "consumer", Environment::unresolved()).unwrap();
    app.add_resource(
        consumer,
        "reader",
        "Demo::Reader",
        Some(PropValue::map([
            ("BucketArn", PropValue::get_att("producer/bucket", "Arn")),
        ])),
    )
    .unwrap();

    let assembly = app.synth().unwrap();

    assert_eq!(
        serde_json::to_value(&assembly.templates["consumer"]).unwrap(),
        json!({
            "Resources": {
                "reader": {
                    "Type": "Demo::Reader",
                    "Properties": { "BucketArn": { "Fn::ImportValue": "producer:bucket:Arn" } }
                }
            }
        })
    );
    assert_eq!(
        serde_json::to_value(&assembly.templates["producer"]).unwrap(),
        json!({
            "Resources": { "bucket": { "Type": "Demo::Bucket" } },
            "Outputs": {
                "ExportbucketArn": {
                    "Value": { "Fn::GetAtt": ["bucket", "Arn"] },
                    "Export": { "Name": "producer:bucket:Arn" }
                }
            }
        })
    );

    let consumer_entry = assembly.manifest.stack("consumer").unwrap();
    assert_eq!(consumer_entry.dependencies, vec!["producer".to_string()]);
    let producer_entry = assembly.manifest.stack("producer").unwrap();
    assert!(producer_entry.dependencies.is_empty());
}

#[test]
fn logical_id_overrides_are_confirmed_not_reallocated() {
    let mut app = App::new(AppConfig::default());
    let root = app.root();
    let stack = app.add_stack(root, "s1", Environment::unresolved()).unwrap();
    let group = app.add_construct(stack, "group").unwrap();
    let res = app.add_resource(group, "deep", "Demo::Thing", None).unwrap();
    app.override_logical_id(res, "Pinned").unwrap();

    let assembly = app.synth().unwrap();
    let template = serde_json::to_value(&assembly.templates["s1"]).unwrap();
    assert_eq!(template["Resources"]["Pinned"], json!({ "Type": "Demo::Thing" }));
    assert_eq!(
        serde_json::to_value(&assembly.manifest.metadata["/s1/group/deep"]).unwrap(),
        json!([{ "type": "stratus:logicalId", "data": "Pinned" }])
    );
}

#[test]
fn colliding_logical_id_overrides_fail_synthesis() {
    let mut app = App::new(AppConfig::default());
    let root = app.root();
    let stack = app.add_stack(root, "s1", Environment::unresolved()).unwrap();
    let a = app.add_resource(stack, "a", "Demo::Thing", None).unwrap();
    let b = app.add_resource(stack, "b", "Demo::Thing", None).unwrap();
    app.override_logical_id(a, "Same").unwrap();
    app.override_logical_id(b, "Same").unwrap();

    let err = app.synth().unwrap_err();
    assert!(matches!(err, CoreError::LogicalIdCollision { ref id, .. } if id == "Same"));
}

#[test]
fn assemblies_persist_one_file_per_stack_plus_a_manifest() {
    let assembly = sample_app(BTreeMap::new()).synth().unwrap();
    let dir = tempfile::TempDir::new().unwrap();

    assembly.write_to_dir(dir.path()).unwrap();

    assert!(dir.path().join("manifest.json").exists());
    assert!(dir.path().join("stack1.template.json").exists());
    assert!(dir.path().join("stack2.template.json").exists());
}

#[test]
fn version_reporting_is_on_by_default_and_can_be_disabled() {
    let mut app = App::new(AppConfig::default());
    let root = app.root();
    app.add_stack(root, "s1", Environment::unresolved()).unwrap();
    let assembly = app.synth().unwrap();
    let runtime = assembly.manifest.runtime.unwrap();
    assert!(runtime.libraries.contains_key("stratus-core"));
    assert!(runtime.libraries.contains_key("stratus-assembly"));

    let mut app = App::new(AppConfig {
        version_reporting: false,
        ..Default::default()
    });
    let root = app.root();
    app.add_stack(root, "s1", Environment::unresolved()).unwrap();
    assert!(app.synth().unwrap().manifest.runtime.is_none());
}
