//! Tests for the session registry and its concurrency contract.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use buzzcore::error::BuzzError;
use buzzcore::session::{ChatRequest, SessionRegistry};
use buzzcore::store::{MemoryStore, SessionStore};
use buzzcore::tools::ToolRegistry;
use buzzcore::types::Role;
use common::{content, ScriptedClient};

fn registry_with(client: Arc<ScriptedClient>) -> SessionRegistry {
    SessionRegistry::new(
        client,
        Arc::new(ToolRegistry::new()),
        "gpt-4o-mini",
        Some("You are terse.".into()),
    )
}

#[tokio::test]
async fn create_get_delete_lifecycle() {
    let client = Arc::new(ScriptedClient::new(vec![]));
    let registry = registry_with(client);

    let id = registry.create(None, None);
    assert_eq!(id.len(), 32); // uuid v4, hex, no hyphens
    assert_eq!(registry.len(), 1);

    let session = registry.get(&id).unwrap();
    assert_eq!(session.id(), id);
    assert_eq!(session.model().await, "gpt-4o-mini");

    registry.delete(&id).unwrap();
    assert!(registry.is_empty());
    assert!(matches!(
        registry.get(&id),
        Err(BuzzError::SessionNotFound(_))
    ));
    assert!(matches!(
        registry.delete(&id),
        Err(BuzzError::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn lookups_never_create_sessions() {
    let client = Arc::new(ScriptedClient::new(vec![]));
    let registry = registry_with(client);
    assert!(registry.get("missing").is_err());
    assert!(registry.is_empty());
}

#[tokio::test]
async fn chat_without_session_id_creates_one() {
    let client = Arc::new(ScriptedClient::new(vec![content("4"), content("8")]));
    let registry = registry_with(client);

    let first = registry
        .chat(ChatRequest {
            prompt: "2+2?".into(),
            ..Default::default()
        })
        .await;
    assert_eq!(first.reply.content, "4");
    assert_eq!(registry.len(), 1);

    // Reusing the returned id continues the same conversation.
    let second = registry
        .chat(ChatRequest {
            session_id: Some(first.session_id.clone()),
            prompt: "4+4?".into(),
            ..Default::default()
        })
        .await;
    assert_eq!(second.session_id, first.session_id);
    assert_eq!(registry.len(), 1);

    let history = registry.get(&first.session_id).unwrap().history().await;
    let roles: Vec<Role> = history.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        [
            Role::System,
            Role::User,
            Role::Assistant,
            Role::User,
            Role::Assistant
        ]
    );
}

#[tokio::test]
async fn chat_with_unknown_session_id_creates_a_fresh_one() {
    let client = Arc::new(ScriptedClient::new(vec![content("hello")]));
    let registry = registry_with(client);

    let outcome = registry
        .chat(ChatRequest {
            session_id: Some("does-not-exist".into()),
            prompt: "hi".into(),
            ..Default::default()
        })
        .await;
    assert_ne!(outcome.session_id, "does-not-exist");
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn chat_applies_model_switch_and_reset_under_the_lock() {
    let client = Arc::new(ScriptedClient::new(vec![content("a"), content("b")]));
    let registry = registry_with(client.clone());

    let first = registry
        .chat(ChatRequest {
            prompt: "one".into(),
            ..Default::default()
        })
        .await;

    let second = registry
        .chat(ChatRequest {
            session_id: Some(first.session_id.clone()),
            prompt: "two".into(),
            model: Some("gpt-4o".into()),
            reset: true,
        })
        .await;
    assert_eq!(second.model, "gpt-4o");
    assert_eq!(client.calls()[1].model, "gpt-4o");

    // Reset dropped the first exchange but kept the system prompt.
    let history = registry.get(&first.session_id).unwrap().history().await;
    let roles: Vec<Role> = history.iter().map(|m| m.role).collect();
    assert_eq!(roles, [Role::System, Role::User, Role::Assistant]);
    assert_eq!(history[1].content, "two");
}

#[tokio::test]
async fn concurrent_turns_on_one_session_serialize() {
    let client = Arc::new(
        ScriptedClient::new(vec![content("first"), content("second")])
            .with_delay(Duration::from_millis(50)),
    );
    let registry = Arc::new(registry_with(client));
    let id = registry.create(None, None);

    let r1 = registry.clone();
    let id1 = id.clone();
    let t1 = tokio::spawn(async move {
        let session = r1.get(&id1).unwrap();
        session.complete("turn A").await
    });
    let r2 = registry.clone();
    let id2 = id.clone();
    let t2 = tokio::spawn(async move {
        let session = r2.get(&id2).unwrap();
        session.complete("turn B").await
    });
    t1.await.unwrap();
    t2.await.unwrap();

    // Strict turn alternation: no interleaved appends.
    let history = registry.get(&id).unwrap().history().await;
    let roles: Vec<Role> = history.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        [
            Role::System,
            Role::User,
            Role::Assistant,
            Role::User,
            Role::Assistant
        ]
    );
}

#[tokio::test]
async fn distinct_sessions_proceed_in_parallel() {
    let delay = Duration::from_millis(200);
    let client =
        Arc::new(ScriptedClient::new(vec![content("a"), content("b")]).with_delay(delay));
    let registry = Arc::new(registry_with(client));
    let id_a = registry.create(None, None);
    let id_b = registry.create(None, None);

    let started = Instant::now();
    let session_a = registry.get(&id_a).unwrap();
    let session_b = registry.get(&id_b).unwrap();
    tokio::join!(session_a.complete("hello"), session_b.complete("hello"));
    let elapsed = started.elapsed();

    // Serial execution would take at least two delays.
    assert!(
        elapsed < delay * 2,
        "sessions blocked on each other: {elapsed:?}"
    );
}

#[tokio::test]
async fn delete_racing_an_in_flight_turn_stays_coherent() {
    let client = Arc::new(
        ScriptedClient::new(vec![content("done")]).with_delay(Duration::from_millis(100)),
    );
    let registry = Arc::new(registry_with(client));
    let id = registry.create(None, None);

    let session = registry.get(&id).unwrap();
    let turn = tokio::spawn(async move { session.complete("slow turn").await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    registry.delete(&id).unwrap();

    // The in-flight turn completes against the detached session.
    let reply = turn.await.unwrap();
    assert_eq!(reply.content, "done");
    // The registry no longer knows the id.
    assert!(registry.get(&id).is_err());
}

#[tokio::test]
async fn list_reports_titles_and_counts() {
    let client = Arc::new(ScriptedClient::new(vec![content("4")]));
    let registry = registry_with(client);

    let idle = registry.create(Some("gpt-4o".into()), None);
    let outcome = registry
        .chat(ChatRequest {
            prompt: "2+2?".into(),
            ..Default::default()
        })
        .await;

    let infos = registry.list().await;
    assert_eq!(infos.len(), 2);

    let active = infos.iter().find(|i| i.id == outcome.session_id).unwrap();
    assert_eq!(active.title.as_deref(), Some("2+2?"));
    assert_eq!(active.message_count, 3); // system + user + assistant
    assert_eq!(active.system_prompt.as_deref(), Some("You are terse."));

    let empty = infos.iter().find(|i| i.id == idle).unwrap();
    assert_eq!(empty.title, None);
    assert_eq!(empty.model, "gpt-4o");
    assert_eq!(empty.message_count, 1);
}

#[tokio::test]
async fn export_import_reconstructs_the_conversation() {
    let client = Arc::new(ScriptedClient::new(vec![content("4")]));
    let registry = registry_with(client);

    let outcome = registry
        .chat(ChatRequest {
            prompt: "2+2?".into(),
            ..Default::default()
        })
        .await;

    let jsonl = registry.export(&outcome.session_id).await.unwrap();
    let imported = registry.import(None, &jsonl).unwrap();
    assert_ne!(imported, outcome.session_id);

    let original = registry.get(&outcome.session_id).unwrap().history().await;
    let copy = registry.get(&imported).unwrap().history().await;
    assert_eq!(original, copy);
}

#[tokio::test]
async fn save_persists_through_the_store() {
    let client = Arc::new(ScriptedClient::new(vec![content("4")]));
    let registry = registry_with(client);
    let store = MemoryStore::new();

    let outcome = registry
        .chat(ChatRequest {
            prompt: "2+2?".into(),
            ..Default::default()
        })
        .await;
    registry.save(&outcome.session_id, &store).await.unwrap();

    let loaded = store.load_history(&outcome.session_id).unwrap();
    assert_eq!(loaded.len(), 3);
    assert!(matches!(
        registry.save("missing", &store).await,
        Err(BuzzError::SessionNotFound(_))
    ));
}
