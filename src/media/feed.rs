use serde::Serialize;
use tokio::sync::broadcast;

/// Change notification for an event's media feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum FeedEvent {
    Created { event_id: String, media_id: String },
    Deleted { event_id: String, media_id: String },
    /// The event stopped admitting guests; streams for it end here.
    Closed { event_id: String },
}

impl FeedEvent {
    pub fn event_id(&self) -> &str {
        match self {
            FeedEvent::Created { event_id, .. }
            | FeedEvent::Deleted { event_id, .. }
            | FeedEvent::Closed { event_id } => event_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FeedEvent::Created { .. } => "created",
            FeedEvent::Deleted { .. } => "deleted",
            FeedEvent::Closed { .. } => "closed",
        }
    }
}

/// In-process fan-out of feed changes to live subscribers (the TV page).
#[derive(Clone)]
pub struct FeedHub {
    tx: broadcast::Sender<FeedEvent>,
}

impl FeedHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: FeedEvent) {
        // No subscribers is the normal case between TV sessions
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.tx.subscribe()
    }
}

impl Default for FeedHub {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let hub = FeedHub::default();
        let mut rx = hub.subscribe();
        hub.publish(FeedEvent::Created {
            event_id: "e1".into(),
            media_id: "m1".into(),
        });

        let got = rx.recv().await.unwrap();
        assert_eq!(got.event_id(), "e1");
        assert_eq!(got.name(), "created");
        assert_eq!(
            serde_json::to_value(&got).unwrap()["mediaId"],
            serde_json::json!("m1")
        );
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        FeedHub::default().publish(FeedEvent::Deleted {
            event_id: "e1".into(),
            media_id: "m1".into(),
        });
    }
}
