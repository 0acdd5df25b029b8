use crate::domain::events::{EventListener, TradingEvent};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Event bus fanning trading events out to subscribed listeners. Listeners
/// run synchronously in publish order, so subscribers observe per-meeting
/// updates exactly as they were appended.
pub struct EventBus {
    listeners: Arc<RwLock<Vec<Arc<dyn EventListener>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn subscribe(&self, listener: Arc<dyn EventListener>) {
        self.listeners.write().await.push(listener);
    }

    pub async fn publish(&self, event: TradingEvent) {
        let listeners = self.listeners.read().await;
        for listener in listeners.iter() {
            listener.on_event(&event);
        }
    }

    /// Subscriber count (for tests).
    pub async fn subscriber_count(&self) -> usize {
        self.listeners.read().await.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            listeners: Arc::clone(&self.listeners),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::LoggingListener;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingListener {
        count: Arc<AtomicUsize>,
    }

    impl EventListener for CountingListener {
        fn on_event(&self, _event: &TradingEvent) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct TopicRecorder {
        topics: Mutex<Vec<&'static str>>,
    }

    impl EventListener for TopicRecorder {
        fn on_event(&self, event: &TradingEvent) {
            self.topics.lock().unwrap().push(event.topic());
        }
    }

    #[tokio::test]
    async fn test_subscribe_and_publish() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count().await, 0);

        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe(Arc::new(CountingListener {
            count: Arc::clone(&count),
        }))
        .await;
        bus.subscribe(Arc::new(LoggingListener)).await;
        assert_eq!(bus.subscriber_count().await, 2);

        bus.publish(TradingEvent::ScanCompleted {
            scanned: 10,
            results: 7,
        })
        .await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_publish_order_is_preserved() {
        let bus = EventBus::new();
        let recorder = Arc::new(TopicRecorder {
            topics: Mutex::new(Vec::new()),
        });
        bus.subscribe(Arc::clone(&recorder) as Arc<dyn EventListener>).await;

        for i in 0..3 {
            bus.publish(TradingEvent::ScanProgress {
                current: i,
                total: 3,
                symbol: "005930".to_string(),
                score: None,
            })
            .await;
        }
        bus.publish(TradingEvent::ScanCompleted {
            scanned: 3,
            results: 3,
        })
        .await;

        let topics = recorder.topics.lock().unwrap();
        assert_eq!(
            *topics,
            vec!["scan.progress", "scan.progress", "scan.progress", "scan.completed"]
        );
    }

    #[tokio::test]
    async fn test_clone_shares_listeners() {
        let bus1 = EventBus::new();
        let bus2 = bus1.clone();
        bus1.subscribe(Arc::new(LoggingListener)).await;
        assert_eq!(bus2.subscriber_count().await, 1);
    }
}
