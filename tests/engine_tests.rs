//! Tests for the conversation engine state machine.

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;

use buzzcore::engine::ChatEngine;
use buzzcore::tools::ToolRegistry;
use buzzcore::types::Role;
use common::{adapter_failure, content, tool_calls, ScriptedClient};

fn engine_with(
    client: Arc<ScriptedClient>,
    tools: ToolRegistry,
    system_prompt: Option<&str>,
) -> ChatEngine {
    ChatEngine::new(
        client,
        Arc::new(tools),
        "gpt-4o-mini",
        system_prompt.map(str::to_string),
    )
}

#[tokio::test]
async fn plain_answer_without_tools_registered() {
    let client = Arc::new(ScriptedClient::new(vec![content("4")]));
    let mut engine = engine_with(client.clone(), ToolRegistry::new(), Some("You are terse."));

    let reply = engine.complete("2+2?").await;
    assert_eq!(reply.role, Role::Assistant);
    assert_eq!(reply.content, "4");

    let roles: Vec<Role> = engine.history().messages().iter().map(|m| m.role).collect();
    assert_eq!(roles, [Role::System, Role::User, Role::Assistant]);

    // With an empty registry the tooled phase is skipped entirely.
    let calls = client.calls();
    assert_eq!(calls.len(), 1);
    assert!(!calls[0].tooled);
}

#[tokio::test]
async fn plain_answer_with_tools_registered_uses_tooled_request() {
    let client = Arc::new(ScriptedClient::new(vec![content("hello")]));
    let mut engine = engine_with(client.clone(), ToolRegistry::with_builtins(), None);

    let reply = engine.complete("hi").await;
    assert_eq!(reply.content, "hello");
    assert!(client.calls()[0].tooled);
}

#[tokio::test]
async fn dice_tool_round_trip() {
    let client = Arc::new(ScriptedClient::new(vec![
        tool_calls(&[("c1", "get_random_D6_dice_value", "")]),
        content("You rolled it!"),
    ]));
    let mut engine = engine_with(client.clone(), ToolRegistry::with_builtins(), None);

    let reply = engine.complete("Roll a die").await;
    assert_eq!(reply.content, "You rolled it!");

    let messages = engine.history().messages();
    assert_eq!(messages.len(), 4);

    assert_eq!(messages[0].role, Role::User);

    let request = &messages[1];
    assert_eq!(request.role, Role::Assistant);
    assert_eq!(request.content, "");
    assert_eq!(request.tool_calls.len(), 1);
    assert_eq!(request.tool_calls[0].id, "c1");
    assert_eq!(request.tool_calls[0].name, "get_random_D6_dice_value");

    let answer = &messages[2];
    assert_eq!(answer.role, Role::Tool);
    assert_eq!(answer.tool_call_id.as_deref(), Some("c1"));
    assert_eq!(answer.tool_name.as_deref(), Some("get_random_D6_dice_value"));
    let value: u32 = answer.content.parse().unwrap();
    assert!((1..=6).contains(&value));

    assert_eq!(messages[3].role, Role::Assistant);

    // The second round-trip carried the tool result upstream.
    let second = &client.calls()[1];
    assert!(second.tooled);
    assert_eq!(second.messages.len(), 3);
    assert_eq!(second.messages[2].role, Role::Tool);
}

#[tokio::test]
async fn unknown_tool_keeps_the_conversation_going() {
    let client = Arc::new(ScriptedClient::new(vec![
        tool_calls(&[("c1", "ghost_tool", "{}")]),
        content("sorry, no ghosts here"),
    ]));
    let mut engine = engine_with(client, ToolRegistry::with_builtins(), None);

    let reply = engine.complete("summon a ghost").await;
    assert_eq!(reply.content, "sorry, no ghosts here");

    let tool_msg = &engine.history().messages()[2];
    assert_eq!(tool_msg.role, Role::Tool);
    assert_eq!(tool_msg.content, "<error: unknown function ghost_tool>");
}

#[tokio::test]
async fn multiple_tool_calls_answered_in_request_order() {
    let client = Arc::new(ScriptedClient::new(vec![
        tool_calls(&[
            ("c1", "get_random_D6_dice_value", ""),
            ("c2", "get_random_D6_dice_value", ""),
        ]),
        content("two rolls done"),
    ]));
    let mut engine = engine_with(client, ToolRegistry::with_builtins(), None);

    engine.complete("roll twice").await;
    let messages = engine.history().messages();
    assert_eq!(messages[2].tool_call_id.as_deref(), Some("c1"));
    assert_eq!(messages[3].tool_call_id.as_deref(), Some("c2"));
}

#[tokio::test]
async fn adapter_failure_falls_back_to_plain_completion() {
    let client = Arc::new(ScriptedClient::new(vec![
        adapter_failure(),
        content("plain ok"),
    ]));
    let mut engine = engine_with(client.clone(), ToolRegistry::with_builtins(), None);

    let reply = engine.complete("hi").await;
    assert_eq!(reply.content, "plain ok");

    let calls = client.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].tooled);
    assert!(!calls[1].tooled);
}

#[tokio::test]
async fn double_failure_records_error_marker() {
    let client = Arc::new(ScriptedClient::new(vec![
        adapter_failure(),
        adapter_failure(),
    ]));
    let mut engine = engine_with(client, ToolRegistry::with_builtins(), None);

    let reply = engine.complete("hi").await;
    assert_eq!(reply.role, Role::Assistant);
    assert!(reply.content.starts_with("<error:"));

    // The failure is recorded in history, not raised.
    let last = engine.history().messages().last().unwrap();
    assert_eq!(last, &reply);
}

#[tokio::test]
async fn round_budget_exhaustion_forces_plain_finalization() {
    let client = Arc::new(ScriptedClient::new(vec![
        tool_calls(&[("c1", "get_random_D6_dice_value", "")]),
        tool_calls(&[("c2", "get_random_D6_dice_value", "")]),
        content("enough rolling"),
    ]));
    let mut engine = engine_with(client.clone(), ToolRegistry::with_builtins(), None)
        .with_max_tool_rounds(2);

    let reply = engine.complete("keep rolling").await;
    assert_eq!(reply.content, "enough rolling");

    let calls = client.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls[0].tooled);
    assert!(calls[1].tooled);
    assert!(!calls[2].tooled);
    // Every issued tool call was still answered before finalization.
    assert!(engine.history().open_tool_calls().is_empty());
}

#[tokio::test]
async fn switch_model_applies_to_next_round_trip() {
    let client = Arc::new(ScriptedClient::new(vec![content("a"), content("b")]));
    let mut engine = engine_with(client.clone(), ToolRegistry::new(), None);

    engine.complete("one").await;
    engine.switch_model("gpt-4o");
    engine.complete("two").await;

    let calls = client.calls();
    assert_eq!(calls[0].model, "gpt-4o-mini");
    assert_eq!(calls[1].model, "gpt-4o");
}

#[tokio::test]
async fn reset_preserving_system_prompt() {
    let client = Arc::new(ScriptedClient::new(vec![content("4")]));
    let mut engine = engine_with(client, ToolRegistry::new(), Some("You are terse."));

    engine.complete("2+2?").await;
    assert_eq!(engine.history().len(), 3);

    engine.reset(true);
    assert_eq!(engine.history().len(), 1);
    assert_eq!(engine.history().messages()[0].role, Role::System);
}
