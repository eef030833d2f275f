//! Converted-content access policy and permission round-trip tests,
//! driven through the tool executor.

#![allow(clippy::expect_used)]

use flavia_rs::agent::message::assistant_tool_calls_message;
use flavia_rs::agent::tool::ToolCall;
use flavia_rs::agent::{AgentContext, ToolExecutor, ToolOutcome};
use flavia_rs::guard::{ConvertedAccessMode, Permissions, check_read, check_write};
use flavia_rs::Settings;
use serde_json::json;
use tempfile::TempDir;

fn seeded_vault() -> (TempDir, AgentContext) {
    let temp = TempDir::new().expect("temp");
    std::fs::create_dir_all(temp.path().join(".converted")).expect("mkdir");
    std::fs::write(
        temp.path().join(".converted/paper.md"),
        "# Paper\n\nConverted evidence body.",
    )
    .expect("write converted");
    std::fs::create_dir_all(temp.path().join(".index")).expect("mkdir index");
    std::fs::write(temp.path().join(".index/index.db"), b"").expect("touch index");

    let ctx = AgentContext {
        base_dir: temp.path().to_path_buf(),
        converted_access_mode: ConvertedAccessMode::Hybrid,
        ..AgentContext::default()
    };
    (temp, ctx)
}

fn text_of(outcome: ToolOutcome) -> String {
    match outcome {
        ToolOutcome::Text(text) => text,
        _ => String::new(),
    }
}

#[tokio::test]
async fn test_hybrid_denies_then_allows_after_search() {
    let (_temp, mut ctx) = seeded_vault();
    let executor = ToolExecutor::new(Settings::default());

    // First attempt: denied with an instruction to ground first.
    let result = text_of(
        executor
            .execute("read_file", &json!({"path": ".converted/paper.md"}), &ctx)
            .await,
    );
    assert!(result.starts_with("Error:"), "got: {result}");
    assert!(result.contains("search_chunks"), "got: {result}");

    // After a search_chunks call appears in the transcript, the same
    // read succeeds.
    ctx.messages.push(assistant_tool_calls_message(vec![ToolCall {
        id: "call_1".to_string(),
        name: "search_chunks".to_string(),
        arguments: r#"{"query":"paper"}"#.to_string(),
    }]));
    let result = text_of(
        executor
            .execute("read_file", &json!({"path": ".converted/paper.md"}), &ctx)
            .await,
    );
    assert!(result.contains("Converted evidence body."), "got: {result}");
}

#[tokio::test]
async fn test_strict_mode_always_denies_converted() {
    let (_temp, mut ctx) = seeded_vault();
    ctx.converted_access_mode = ConvertedAccessMode::Strict;
    ctx.messages.push(assistant_tool_calls_message(vec![ToolCall {
        id: "call_1".to_string(),
        name: "search_chunks".to_string(),
        arguments: r#"{"query":"paper"}"#.to_string(),
    }]));
    let executor = ToolExecutor::new(Settings::default());
    let result = text_of(
        executor
            .execute("read_file", &json!({"path": ".converted/paper.md"}), &ctx)
            .await,
    );
    assert!(result.starts_with("Error:"));
    assert!(result.contains("strict"));
}

#[tokio::test]
async fn test_open_mode_allows_converted_directly() {
    let (_temp, mut ctx) = seeded_vault();
    ctx.converted_access_mode = ConvertedAccessMode::Open;
    let executor = ToolExecutor::new(Settings::default());
    let result = text_of(
        executor
            .execute("read_file", &json!({"path": ".converted/paper.md"}), &ctx)
            .await,
    );
    assert!(result.contains("Converted evidence body."));
}

#[test]
fn test_write_permission_implies_read() {
    let (_temp, mut ctx) = seeded_vault();
    ctx.permissions = Permissions {
        read_paths: vec![],
        write_paths: vec![ctx.base_dir.join("out")],
        explicit: true,
    };
    let target = ctx.base_dir.join("out/report.md");
    assert!(check_write(&target, &ctx).is_ok());
    assert!(check_read(&target, &ctx).is_ok());

    // And the converse does not hold for a read-only scope.
    ctx.permissions = Permissions {
        read_paths: vec![ctx.base_dir.join("docs")],
        write_paths: vec![],
        explicit: true,
    };
    let doc = ctx.base_dir.join("docs/a.md");
    assert!(check_read(&doc, &ctx).is_ok());
    assert!(check_write(&doc, &ctx).is_err());
}

#[test]
fn test_explicit_empty_permissions_deny_everything() {
    let (_temp, mut ctx) = seeded_vault();
    ctx.permissions = Permissions {
        read_paths: vec![],
        write_paths: vec![],
        explicit: true,
    };
    assert!(check_read(&ctx.base_dir.join("a.md"), &ctx).is_err());
    assert!(check_write(&ctx.base_dir.join("a.md"), &ctx).is_err());
}

#[test]
fn test_traversal_cannot_escape_base_dir() {
    let (_temp, ctx) = seeded_vault();
    let escape = flavia_rs::guard::resolve_path("notes/../../etc/passwd", &ctx.base_dir);
    assert!(!escape.starts_with(&ctx.base_dir));
    assert!(check_read(&escape, &ctx).is_err());
}
