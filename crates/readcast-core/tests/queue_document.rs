//! Queue document persistence shape and restore behavior.

use readcast_core::{
    EnqueuePosition, ItemId, Queue, QueueDocument, QueueItem, QUEUE_DOCUMENT_VERSION,
};
use serde_json::json;

#[test]
fn test_document_matches_persisted_layout() {
    let mut queue = Queue::new();
    let item = QueueItem::text("article-1", "Essay")
        .with_id(ItemId::from("id-1"))
        .with_author("Ann");
    queue.enqueue(item, EnqueuePosition::Append).unwrap();

    let value = serde_json::to_value(QueueDocument::from_queue(&queue)).unwrap();
    assert_eq!(value["version"], QUEUE_DOCUMENT_VERSION);
    assert_eq!(value["currentIndex"], 0);

    let record = &value["items"][0];
    assert_eq!(record["id"], "id-1");
    assert_eq!(record["kind"], "text");
    assert_eq!(record["contentId"], "article-1");
    assert_eq!(record["author"], "Ann");
    assert_eq!(record["listened"], false);
    assert_eq!(record["kept"], false);
    assert!(record.get("audioUrl").is_none());
}

#[test]
fn test_restore_from_hand_written_document() {
    let doc = json!({
        "version": 1,
        "currentIndex": 2,
        "items": [
            { "id": "a", "kind": "stream", "contentId": "e1", "audioUrl": "https://x/1.mp3",
              "title": "One", "feedLabel": "news", "addedAt": "2025-01-01T00:00:00Z",
              "lastPosition": 12.5, "listened": false },
            { "id": "a", "kind": "stream", "contentId": "e1", "audioUrl": "https://x/1.mp3",
              "title": "One (dup)", "addedAt": "2025-01-01T00:00:00Z",
              "lastPosition": 0.0, "listened": false },
            { "id": "b", "kind": "text", "contentId": "t1", "title": "Two",
              "addedAt": "2025-01-02T00:00:00Z", "lastPosition": 0.0, "listened": true,
              "kept": true }
        ]
    });

    let document: QueueDocument = serde_json::from_value(doc).unwrap();
    let queue = document.into_queue();

    assert_eq!(queue.len(), 2);
    assert_eq!(queue.get(0).unwrap().title(), "One");
    assert_eq!(queue.current().unwrap().id, ItemId::from("b"));
    assert!(queue.current().unwrap().kept);
}

#[test]
fn test_enqueue_persist_restore_round_trip() {
    let mut queue = Queue::new();
    for i in 0..5 {
        let item = if i % 2 == 0 {
            QueueItem::text(format!("t{i}"), format!("Text {i}"))
        } else {
            QueueItem::stream(format!("s{i}"), format!("https://x/{i}.mp3"), format!("Ep {i}"))
                .with_feed_label("feed")
                .with_known_duration(90.0)
        };
        queue.enqueue(item, EnqueuePosition::Append).unwrap();
    }
    queue.select(3).unwrap();

    let bytes = serde_json::to_vec(&QueueDocument::from_queue(&queue)).unwrap();
    let restored = serde_json::from_slice::<QueueDocument>(&bytes)
        .unwrap()
        .into_queue();
    assert_eq!(restored, queue);
}
