mod common;

use common::{EXTRACTED, Harness, StaticExtractor};
use insurance_flow::{
    DocumentSource, InMemorySessionStore, InboundMessage, SessionState, UserId, messages,
};
use std::{sync::Arc, time::Duration};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn independent_users_progress_concurrently() {
    let harness = Harness::new(StaticExtractor::ok(EXTRACTED).with_delay(Duration::from_millis(10)));
    let users: Vec<UserId> = (0..32_i64).map(UserId::from).collect();

    let mut handles = Vec::new();
    for user in users.clone() {
        let dispatcher = harness.dispatcher.clone();
        handles.push(tokio::spawn(async move {
            dispatcher
                .handle(InboundMessage::text(user.clone(), "/start"))
                .await?;
            dispatcher
                .handle(InboundMessage::photo(
                    user.clone(),
                    DocumentSource::Inline(vec![0xFF, 0xD8]),
                ))
                .await?;
            dispatcher
                .handle(InboundMessage::text(user.clone(), "/confirm"))
                .await?;
            dispatcher
                .handle(InboundMessage::text(user, "/acceptprice"))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    for user in &users {
        assert_eq!(harness.state(user).await, SessionState::PriceAccepted);
        assert_eq!(harness.messenger.documents_for(user).len(), 1);
    }
    assert_eq!(harness.registry.store().len().await.unwrap(), users.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_contact_creates_one_session() {
    let harness = Harness::new(StaticExtractor::ok(EXTRACTED));
    let user = UserId::from(500_i64);

    let mut handles = Vec::new();
    for _ in 0..16 {
        let dispatcher = harness.dispatcher.clone();
        let user = user.clone();
        handles.push(tokio::spawn(async move {
            dispatcher
                .handle(InboundMessage::text(user, "/declineprice"))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(harness.registry.store().len().await.unwrap(), 1);
    assert_eq!(harness.messenger.texts_for(&user).len(), 16);
}

#[tokio::test]
async fn second_photo_during_extraction_is_discarded() {
    let harness = Harness::new(StaticExtractor::ok(EXTRACTED).with_delay(Duration::from_millis(50)));
    let user = UserId::from(600_i64);

    harness
        .dispatcher
        .handle(InboundMessage::text(user.clone(), "/start"))
        .await
        .unwrap();
    harness.messenger.clear();

    let first = {
        let dispatcher = harness.dispatcher.clone();
        let user = user.clone();
        tokio::spawn(async move {
            dispatcher
                .handle(InboundMessage::photo(user, DocumentSource::Inline(vec![1])))
                .await
        })
    };
    let second = {
        let dispatcher = harness.dispatcher.clone();
        let user = user.clone();
        tokio::spawn(async move {
            dispatcher
                .handle(InboundMessage::photo(user, DocumentSource::Inline(vec![2])))
                .await
        })
    };
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    let session = harness.session(&user).await;
    assert_eq!(session.state(), SessionState::AwaitingConfirmation);
    assert_eq!(session.extracted_data(), Some(EXTRACTED));
    assert_eq!(
        harness.messenger.texts_for(&user),
        vec![messages::extraction_summary(EXTRACTED)]
    );
}

#[tokio::test]
async fn extraction_does_not_block_other_events_for_the_user() {
    let harness = Harness::new(StaticExtractor::ok(EXTRACTED).with_delay(Duration::from_millis(200)));
    let user = UserId::from(700_i64);

    harness
        .dispatcher
        .handle(InboundMessage::text(user.clone(), "/start"))
        .await
        .unwrap();
    harness.messenger.clear();

    let extraction = {
        let dispatcher = harness.dispatcher.clone();
        let user = user.clone();
        tokio::spawn(async move {
            dispatcher
                .handle(InboundMessage::photo(user, DocumentSource::Inline(vec![3])))
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    tokio::time::timeout(
        Duration::from_millis(100),
        harness
            .dispatcher
            .handle(InboundMessage::text(user.clone(), "/declineprice")),
    )
    .await
    .expect("decline should not wait for extraction")
    .unwrap();

    extraction.await.unwrap().unwrap();

    assert_eq!(
        harness.messenger.texts_for(&user),
        vec![
            messages::decline(100),
            messages::extraction_summary(EXTRACTED)
        ]
    );
    assert_eq!(harness.state(&user).await, SessionState::AwaitingConfirmation);
}

#[tokio::test]
async fn extraction_result_for_evicted_session_is_dropped() {
    let harness = Harness::with_store(
        StaticExtractor::ok(EXTRACTED).with_delay(Duration::from_millis(100)),
        Arc::new(InMemorySessionStore::with_capacity_limit(1)),
    );
    let first = UserId::from(501_i64);
    let second = UserId::from(502_i64);

    harness
        .dispatcher
        .handle(InboundMessage::text(first.clone(), "/start"))
        .await
        .unwrap();

    let extraction = {
        let dispatcher = harness.dispatcher.clone();
        let first = first.clone();
        tokio::spawn(async move {
            dispatcher
                .handle(InboundMessage::photo(first, DocumentSource::Inline(vec![1])))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    harness
        .dispatcher
        .handle(InboundMessage::text(second.clone(), "/start"))
        .await
        .unwrap();
    assert!(harness.registry.store().get(&first).await.unwrap().is_none());

    extraction.await.unwrap().unwrap();

    assert_eq!(harness.messenger.texts_for(&first), vec![messages::START]);
    assert_eq!(harness.state(&first).await, SessionState::Idle);
}
