//! Integration tests for Chatterbox
//!
//! These tests drive full nodes over an in-process hub, from broadcast and
//! inbound delivery through persisted history and live feeds.

use chatterbox::config::ChatterboxConfig;
use chatterbox::locks::KeyMutex;
use chatterbox::messages::{CancellationToken, FeedError, Messages, PeerHistory};
use chatterbox::peers::{MemoryDirectory, PeerDirectory};
use chatterbox::pubsub::LocalHub;
use chatterbox::store::{FilesystemStore, HistoryStore, MemoryStore};
use chatterbox::Chatterbox;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const ME: &str = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";
const FRIEND: &str = "QmFriend";
const STRANGER: &str = "QmStranger";

fn config(history_size: usize) -> ChatterboxConfig {
    ChatterboxConfig {
        friends_message_history_size: history_size,
        ..ChatterboxConfig::default()
    }
}

async fn messages_node(
    hub: &LocalHub,
    directory: MemoryDirectory,
    history_size: usize,
) -> (Messages, MemoryStore) {
    let store = MemoryStore::new();
    let messages = Messages::new(
        Arc::new(hub.node(ME)),
        Arc::new(store.clone()),
        Arc::new(directory),
        KeyMutex::new(),
        &config(history_size),
    )
    .await
    .unwrap();
    (messages, store)
}

fn envelope(text: &str) -> Vec<u8> {
    serde_json::json!({ "version": "1.0.0", "text": text })
        .to_string()
        .into_bytes()
}

fn texts(history: &PeerHistory) -> Vec<String> {
    history.iter().map(|m| m.text.clone()).collect()
}

async fn wait_for(messages: &Messages, peer_id: &str, expected_last: &str) -> PeerHistory {
    for _ in 0..200 {
        let history = messages.list(peer_id).await.unwrap();
        if history.last().map(|m| m.text.as_str()) == Some(expected_last) {
            return history;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{} never received {:?}", peer_id, expected_last);
}

mod broadcast_tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_then_read_own_history() {
        let hub = LocalHub::new();
        let (messages, _store) = messages_node(&hub, MemoryDirectory::new(), 10).await;

        for text in ["first", "second", "Hello World!"] {
            messages.broadcast(text).await.unwrap();
            let history = messages.list(ME).await.unwrap();
            assert_eq!(texts(&history), vec![text.to_string()]);
        }
    }

    #[tokio::test]
    async fn test_broadcast_reaches_other_nodes() {
        let hub = LocalHub::new();
        let directory = MemoryDirectory::with_friends([FRIEND]).await.unwrap();
        let (messages, _store) = messages_node(&hub, directory, 10).await;

        let friend = Messages::new(
            Arc::new(hub.node(FRIEND)),
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryDirectory::new()),
            KeyMutex::new(),
            &config(10),
        )
        .await
        .unwrap();

        friend.broadcast("hi there").await.unwrap();
        let history = wait_for(&messages, FRIEND, "hi there").await;
        assert_eq!(history.len(), 1);

        friend.destroy().await.unwrap();
    }
}

mod validation_tests {
    use super::*;

    #[tokio::test]
    async fn test_malformed_payloads_leave_history_unchanged() {
        let hub = LocalHub::new();
        let directory = MemoryDirectory::with_friends([FRIEND]).await.unwrap();
        let (messages, _store) = messages_node(&hub, directory, 10).await;
        let topic = messages.topic().to_string();

        hub.inject(FRIEND, &topic, envelope("kept")).await.unwrap();
        let before = wait_for(&messages, FRIEND, "kept").await;

        let hostile: Vec<Vec<u8>> = vec![
            b"{".to_vec(),
            vec![0xde, 0xad, 0xbe, 0xef],
            br#"{"version":"1.0.0","text":null}"#.to_vec(),
            br#"{"version":"1.0.0"}"#.to_vec(),
            br#"{"version":"0.0.1","text":"old"}"#.to_vec(),
            br#"["1.0.0","text"]"#.to_vec(),
        ];
        for payload in hostile {
            hub.inject(FRIEND, &topic, payload).await.unwrap();
        }
        hub.inject(ME, &topic, envelope("From myself")).await.unwrap();

        // A valid envelope from someone else proves the listener survived
        hub.inject(STRANGER, &topic, envelope("still listening")).await.unwrap();
        wait_for(&messages, STRANGER, "still listening").await;

        assert_eq!(messages.list(FRIEND).await.unwrap(), before);
        assert!(messages.list(ME).await.unwrap().is_empty());
    }
}

mod retention_tests {
    use super::*;

    #[tokio::test]
    async fn test_friend_history_is_capped_at_n() {
        const N: usize = 5;
        let hub = LocalHub::new();
        let directory = MemoryDirectory::with_friends([FRIEND]).await.unwrap();
        let (messages, _store) = messages_node(&hub, directory, N).await;
        let topic = messages.topic().to_string();

        let sent: Vec<String> = (0..N + 3).map(|i| format!("message {}", i)).collect();
        for text in &sent {
            hub.inject(FRIEND, &topic, envelope(text)).await.unwrap();
        }

        let history = wait_for(&messages, FRIEND, sent.last().unwrap()).await;
        assert_eq!(history.len(), N);
        assert_eq!(texts(&history), sent[sent.len() - N..].to_vec());
    }

    #[tokio::test]
    async fn test_stranger_history_is_always_one() {
        let hub = LocalHub::new();
        let (messages, _store) = messages_node(&hub, MemoryDirectory::new(), 5).await;
        let topic = messages.topic().to_string();

        for text in ["a", "b", "c", "d"] {
            hub.inject(STRANGER, &topic, envelope(text)).await.unwrap();
            let history = wait_for(&messages, STRANGER, text).await;
            assert_eq!(history.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_becoming_a_friend_extends_retention() {
        let hub = LocalHub::new();
        let directory = MemoryDirectory::new();
        let (messages, _store) = messages_node(&hub, directory.clone(), 5).await;
        let topic = messages.topic().to_string();

        hub.inject(STRANGER, &topic, envelope("one")).await.unwrap();
        hub.inject(STRANGER, &topic, envelope("two")).await.unwrap();
        assert_eq!(wait_for(&messages, STRANGER, "two").await.len(), 1);

        directory.set_friend(STRANGER, true).await.unwrap();
        hub.inject(STRANGER, &topic, envelope("three")).await.unwrap();
        let history = wait_for(&messages, STRANGER, "three").await;
        assert_eq!(texts(&history), vec!["two", "three"]);
    }
}

mod feed_tests {
    use super::*;

    #[tokio::test]
    async fn test_feed_observes_appends_in_order() {
        let hub = LocalHub::new();
        let directory = MemoryDirectory::with_friends([FRIEND]).await.unwrap();
        let (messages, _store) = messages_node(&hub, directory, 10).await;
        let topic = messages.topic().to_string();

        let token = CancellationToken::new();
        let mut feed = messages.feed(FRIEND, token.clone()).unwrap();
        assert!(feed.next().await.unwrap().unwrap().is_empty());

        for text in ["1", "2", "3"] {
            hub.inject(FRIEND, &topic, envelope(text)).await.unwrap();
        }

        let expected = vec!["1".to_string(), "2".to_string(), "3".to_string()];
        loop {
            let snapshot = texts(&feed.next().await.unwrap().unwrap());
            assert!(expected.starts_with(&snapshot), "out of order: {:?}", snapshot);
            if snapshot == expected {
                break;
            }
        }

        token.cancel();
        assert!(matches!(feed.next().await, Some(Err(FeedError::Aborted))));
        assert!(feed.next().await.is_none());
    }

    #[tokio::test]
    async fn test_cancelling_one_feed_leaves_others_running() {
        let hub = LocalHub::new();
        let directory = MemoryDirectory::with_friends([FRIEND]).await.unwrap();
        let (messages, _store) = messages_node(&hub, directory, 10).await;
        let topic = messages.topic().to_string();

        let cancelled = CancellationToken::new();
        let mut own_feed = messages.feed(ME, cancelled.clone()).unwrap();
        let mut friend_feed = messages.feed(FRIEND, CancellationToken::new()).unwrap();
        own_feed.next().await.unwrap().unwrap();
        friend_feed.next().await.unwrap().unwrap();

        cancelled.cancel();
        messages.broadcast("after cancel").await.unwrap();
        hub.inject(FRIEND, &topic, envelope("still flowing")).await.unwrap();

        assert!(matches!(own_feed.next().await, Some(Err(FeedError::Aborted))));
        assert!(own_feed.next().await.is_none());

        let snapshot = friend_feed.next().await.unwrap().unwrap();
        assert_eq!(texts(&snapshot), vec!["still flowing"]);
    }
}

mod concurrency_tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_interleaved_broadcasts_and_inbound() {
        let hub = LocalHub::new();
        let directory = MemoryDirectory::with_friends([FRIEND]).await.unwrap();
        let (messages, store) = messages_node(&hub, directory, 100).await;
        let messages = Arc::new(messages);
        let topic = messages.topic().to_string();

        let mut handles = Vec::new();
        for i in 0..10 {
            let messages = messages.clone();
            handles.push(tokio::spawn(async move {
                messages.broadcast(&format!("mine {}", i)).await.unwrap();
            }));

            let hub = hub.clone();
            let topic = topic.clone();
            handles.push(tokio::spawn(async move {
                hub.inject(FRIEND, &topic, envelope(&format!("theirs {}", i)))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        for _ in 0..200 {
            if messages.list(FRIEND).await.unwrap().len() == 10 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let own = messages.list(ME).await.unwrap();
        assert_eq!(own.len(), 1);
        assert!(own[0].text.starts_with("mine "));

        let theirs = messages.list(FRIEND).await.unwrap();
        assert_eq!(theirs.len(), 10);
        assert!(theirs.iter().all(|m| m.text.starts_with("theirs ")));

        // Persisted bytes are well-formed JSON arrays
        for path in store.paths().await {
            let bytes = store.read(&path).await.unwrap().unwrap();
            let _: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        }
    }
}

mod filesystem_tests {
    use super::*;

    #[tokio::test]
    async fn test_node_persists_to_disk() {
        let temp_dir = TempDir::new().unwrap();
        let hub = LocalHub::new();
        let config = config(10);

        let node = Chatterbox::open(
            Arc::new(hub.node(ME)),
            Arc::new(FilesystemStore::new(temp_dir.path())),
            config.clone(),
        )
        .await
        .unwrap();

        node.peers().set_friend(FRIEND, true).await.unwrap();
        node.messages().broadcast("on disk").await.unwrap();
        hub.inject(FRIEND, &config.topics.broadcast, envelope("from a friend"))
            .await
            .unwrap();
        wait_for(node.messages(), FRIEND, "from a friend").await;
        node.destroy().await.unwrap();

        let history_file = temp_dir
            .path()
            .join(".chatterbox/peers")
            .join(ME)
            .join("messages.json");
        let raw = std::fs::read_to_string(history_file).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed[0]["text"], "on disk");
        assert!(parsed[0]["receivedAt"].as_i64().unwrap() > 0);

        // A fresh node over the same directory sees the same state
        let reopened = Chatterbox::open(
            Arc::new(LocalHub::new().node(ME)),
            Arc::new(FilesystemStore::new(temp_dir.path())),
            config,
        )
        .await
        .unwrap();
        assert_eq!(reopened.peers().list_friends().await.unwrap(), vec![FRIEND]);
        assert_eq!(
            texts(&reopened.messages().list(FRIEND).await.unwrap()),
            vec!["from a friend"]
        );
        reopened.destroy().await.unwrap();
    }

    #[test]
    fn test_config_round_trip_on_disk() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested/config.yaml");

        let mut config = ChatterboxConfig::new();
        config.friends_message_history_size = 42;
        config.save(&config_path).unwrap();

        let loaded = ChatterboxConfig::load_or_default(&config_path).unwrap();
        assert_eq!(loaded.friends_message_history_size, 42);
        assert_eq!(loaded.peers_path(), "/.chatterbox/peers");
    }
}
