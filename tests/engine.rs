//! End-to-end scenarios for the synchronization engine, driven the same way
//! the websocket and HTTP layers drive it.

use confab::db;
use confab::error::AppError;
use confab::event::Event;
use confab::store;
use confab::sync::SyncEngine;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

async fn engine_with_users(usernames: &[&str]) -> SyncEngine {
    let pool = db::connect_in_memory().await.unwrap();
    for username in usernames {
        store::insert_user(&pool, username).await.unwrap();
    }
    SyncEngine::new(pool)
}

fn drain(rx: &mut UnboundedReceiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn one_on_one_conversations_are_unique_per_pair() {
    let engine = engine_with_users(&["ada", "bob"]).await;

    let convo = engine.create_conversation(1, "", &[2]).await.unwrap();
    assert_eq!(convo.name, "");
    assert!(!convo.is_group);
    assert_eq!(engine.membership.members_of(convo.id).await.unwrap(), vec![1, 2]);

    let err = engine.create_conversation(1, "", &[2]).await.unwrap_err();
    assert!(matches!(err, AppError::DuplicateConversation));
}

#[tokio::test]
async fn concurrent_creations_for_the_same_pair_yield_one_conversation() {
    let engine = engine_with_users(&["ada", "bob"]).await;

    let a = engine.clone();
    let b = engine.clone();
    let (first, second) = tokio::join!(
        tokio::spawn(async move { a.create_conversation(1, "", &[2]).await }),
        tokio::spawn(async move { b.create_conversation(2, "", &[1]).await }),
    );
    let results = [first.unwrap(), second.unwrap()];

    let created = results.iter().filter(|r| r.is_ok()).count();
    let duplicates = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::DuplicateConversation)))
        .count();
    assert_eq!((created, duplicates), (1, 1));
}

#[tokio::test]
async fn history_matches_append_order_per_conversation() {
    let engine = engine_with_users(&["ada", "bob", "cyd"]).await;

    let left = engine.create_conversation(1, "left", &[2]).await.unwrap();
    let right = engine.create_conversation(1, "right", &[2, 3]).await.unwrap();

    // Appends to different conversations proceed concurrently; each
    // conversation's own order must match its append order.
    let (a, b) = (engine.clone(), engine.clone());
    let (left_id, right_id) = (left.id, right.id);
    let (la, lb) = tokio::join!(
        tokio::spawn(async move {
            for i in 0..10 {
                a.send_message(1, left_id, &format!("l{i}")).await.unwrap();
            }
        }),
        tokio::spawn(async move {
            for i in 0..10 {
                b.send_message(2, right_id, &format!("r{i}")).await.unwrap();
            }
        }),
    );
    la.unwrap();
    lb.unwrap();

    for (conversation_id, prefix) in [(left.id, "l"), (right.id, "r")] {
        let msgs = engine.history(1, conversation_id, 0, 100).await.unwrap();
        assert_eq!(msgs.len(), 10);
        for (i, msg) in msgs.iter().enumerate() {
            assert_eq!(msg.content, format!("{prefix}{i}"));
        }
        for pair in msgs.windows(2) {
            assert!(pair[0].sent_at <= pair[1].sent_at);
        }
    }
}

#[tokio::test]
async fn membership_is_visible_immediately_after_creation() {
    let engine = engine_with_users(&["ada", "bob", "cyd"]).await;

    let convo = engine.create_conversation(1, "", &[2]).await.unwrap();

    assert!(engine.membership.is_member(1, convo.id).await.unwrap());
    assert!(engine.membership.is_member(2, convo.id).await.unwrap());
    assert!(!engine.membership.is_member(3, convo.id).await.unwrap());
}

#[tokio::test]
async fn presence_follows_the_last_session() {
    let engine = engine_with_users(&["ada", "bob"]).await;

    let (observer_tx, mut observer_rx) = unbounded_channel();
    engine.connect(2, observer_tx);

    let (tx, _rx1) = unbounded_channel();
    let first = engine.connect(1, tx);
    let (tx, _rx2) = unbounded_channel();
    let second = engine.connect(1, tx);

    // Only the 0→1 edge is announced.
    let events = drain(&mut observer_rx);
    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0],
        Event::Presence { user_id: 1, is_online: true }
    ));

    engine.disconnect(first);
    assert!(engine.registry.is_online(1));
    assert!(drain(&mut observer_rx).is_empty(), "no edge until the last drop");

    engine.disconnect(second);
    assert!(!engine.registry.is_online(1));
    let events = drain(&mut observer_rx);
    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0],
        Event::Presence { user_id: 1, is_online: false }
    ));

    // Late duplicate disconnect notifications are no-ops.
    engine.disconnect(second);
    engine.disconnect(first);
    assert!(drain(&mut observer_rx).is_empty());
}

#[tokio::test]
async fn messages_reach_connected_members_and_only_them() {
    let engine = engine_with_users(&["ada", "bob", "cyd"]).await;
    let convo = engine.create_conversation(1, "team", &[2, 3]).await.unwrap();

    let (sender_tx, mut sender_rx) = unbounded_channel();
    engine.connect(1, sender_tx);
    let (tx, mut bob_rx) = unbounded_channel();
    engine.connect(2, tx);
    // User 3 is a member but not connected.

    drain(&mut sender_rx);
    drain(&mut bob_rx);

    engine.send_message(1, convo.id, "hello").await.unwrap();

    let events = drain(&mut bob_rx);
    assert!(events.iter().any(|e| matches!(
        e,
        Event::Message { conversation_id, content, sender_id: 1, .. }
            if *conversation_id == convo.id && content == "hello"
    )));

    // The sender's own session sees the message too (second-device behavior).
    assert!(drain(&mut sender_rx)
        .iter()
        .any(|e| matches!(e, Event::Message { .. })));

    // The disconnected member catches up through history on reconnect.
    let msgs = engine.history(3, convo.id, 0, 100).await.unwrap();
    assert_eq!(msgs.len(), 1);
    assert_eq!(msgs[0].content, "hello");
}

#[tokio::test]
async fn typing_reaches_other_members_but_never_the_sender() {
    let engine = engine_with_users(&["ada", "bob"]).await;
    let convo = engine.create_conversation(1, "", &[2]).await.unwrap();

    let (tx, mut ada_first) = unbounded_channel();
    engine.connect(1, tx);
    let (tx, mut ada_second) = unbounded_channel();
    engine.connect(1, tx);
    let (tx, mut bob_rx) = unbounded_channel();
    engine.connect(2, tx);

    drain(&mut ada_first);
    drain(&mut ada_second);
    drain(&mut bob_rx);

    engine.notify_typing(1, convo.id, true).await.unwrap();

    assert!(drain(&mut ada_first).is_empty());
    assert!(drain(&mut ada_second).is_empty());
    let events = drain(&mut bob_rx);
    assert!(matches!(
        events.as_slice(),
        [Event::Typing { user_id: 1, is_typing: true, .. }]
    ));
}

#[tokio::test]
async fn non_members_cannot_signal_or_append() {
    let engine = engine_with_users(&["ada", "bob", "cyd"]).await;
    let convo = engine.create_conversation(1, "", &[2]).await.unwrap();

    let (tx, mut bob_rx) = unbounded_channel();
    engine.connect(2, tx);
    drain(&mut bob_rx);

    for is_typing in [true, false] {
        let err = engine.notify_typing(3, convo.id, is_typing).await.unwrap_err();
        assert!(matches!(err, AppError::NotAMember(_)));
    }
    assert!(drain(&mut bob_rx).is_empty(), "no signal leaked to members");

    let err = engine.send_message(3, convo.id, "hi").await.unwrap_err();
    assert!(matches!(err, AppError::NotAMember(_)));
    assert!(drain(&mut bob_rx).is_empty());
    assert!(
        engine.history(1, convo.id, 0, 100).await.unwrap().is_empty(),
        "no row written for a rejected append"
    );

    // Non-members cannot read either.
    let err = engine.history(3, convo.id, 0, 100).await.unwrap_err();
    assert!(matches!(err, AppError::NotAMember(_)));
}

#[tokio::test]
async fn empty_messages_are_rejected() {
    let engine = engine_with_users(&["ada", "bob"]).await;
    let convo = engine.create_conversation(1, "", &[2]).await.unwrap();

    let err = engine.send_message(1, convo.id, " \n\t ").await.unwrap_err();
    assert!(matches!(err, AppError::EmptyMessage));
}

#[tokio::test]
async fn delivery_order_matches_insertion_order() {
    let engine = engine_with_users(&["ada", "bob"]).await;
    let convo = engine.create_conversation(1, "", &[2]).await.unwrap();

    let (tx, mut bob_rx) = unbounded_channel();
    engine.connect(2, tx);
    drain(&mut bob_rx);

    for i in 0..25 {
        engine.send_message(1, convo.id, &format!("m{i}")).await.unwrap();
    }

    let received: Vec<String> = drain(&mut bob_rx)
        .into_iter()
        .filter_map(|e| match e {
            Event::Message { content, .. } => Some(content),
            _ => None,
        })
        .collect();
    let expected: Vec<String> = (0..25).map(|i| format!("m{i}")).collect();
    assert_eq!(received, expected);
}

#[tokio::test]
async fn last_message_feeds_conversation_previews() {
    let engine = engine_with_users(&["ada", "bob"]).await;
    let convo = engine.create_conversation(1, "", &[2]).await.unwrap();

    engine.send_message(1, convo.id, "first").await.unwrap();
    engine.send_message(2, convo.id, "latest").await.unwrap();

    let preview = engine.log.last_message(convo.id).await.unwrap().unwrap();
    assert_eq!(preview.content, "latest");
}
