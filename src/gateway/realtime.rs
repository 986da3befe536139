use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tracing::debug;

use super::Row;

/// A row inserted into a table, as delivered by the realtime channel.
#[derive(Debug, Clone, PartialEq)]
pub struct RowEvent {
    pub table: String,
    pub row: Row,
}

/// Channel predicate: one table, one column equal to one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelFilter {
    pub table: String,
    pub column: String,
    pub value: String,
}

impl ChannelFilter {
    pub fn new(table: &str, column: &str, value: impl ToString) -> Self {
        Self {
            table: table.to_owned(),
            column: column.to_owned(),
            value: value.to_string(),
        }
    }

    pub fn topic(&self) -> String {
        format!("realtime:{}:{}=eq.{}", self.table, self.column, self.value)
    }

    pub fn matches(&self, event: &RowEvent) -> bool {
        event.table == self.table
            && event
                .row
                .get(&self.column)
                .map(|value| match value {
                    serde_json::Value::String(s) => *s == self.value,
                    other => other.to_string() == self.value,
                })
                .unwrap_or(false)
    }
}

/// Live subscription. Dropping it tears the channel down.
pub struct Subscription {
    filter: ChannelFilter,
    rx: mpsc::Receiver<RowEvent>,
    task: JoinHandle<()>,
}

impl Subscription {
    pub(crate) fn new(filter: ChannelFilter, rx: mpsc::Receiver<RowEvent>, task: JoinHandle<()>) -> Self {
        Self { filter, rx, task }
    }

    pub fn filter(&self) -> &ChannelFilter {
        &self.filter
    }

    /// Next matching insert, or `None` once the channel is gone.
    pub async fn next(&mut self) -> Option<RowEvent> {
        self.rx.recv().await
    }

    pub fn try_next(&mut self) -> Option<RowEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        debug!("tearing down {}", self.filter.topic());
        self.task.abort();
    }
}

/// Narrows a broadcast hub down to the events one subscriber asked for.
pub(crate) fn forward(filter: ChannelFilter, mut hub: broadcast::Receiver<RowEvent>) -> Subscription {
    let (tx, rx) = mpsc::channel(64);
    let task_filter = filter.clone();

    let task = tokio::spawn(async move {
        loop {
            match hub.recv().await {
                Ok(event) if task_filter.matches(&event) => {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("{} lagged, {skipped} events lost", task_filter.topic());
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    Subscription::new(filter, rx, task)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn filter_matches_table_and_column() {
        let filter = ChannelFilter::new("messages", "chat_id", "c1");
        let hit = RowEvent {
            table: "messages".to_owned(),
            row: json!({"chat_id": "c1"}),
        };
        let other_chat = RowEvent {
            table: "messages".to_owned(),
            row: json!({"chat_id": "c2"}),
        };
        let other_table = RowEvent {
            table: "notifications".to_owned(),
            row: json!({"chat_id": "c1"}),
        };

        assert!(filter.matches(&hit));
        assert!(!filter.matches(&other_chat));
        assert!(!filter.matches(&other_table));
        assert_eq!(filter.topic(), "realtime:messages:chat_id=eq.c1");
    }

    #[tokio::test]
    async fn forward_only_delivers_matching_events() {
        let (hub, _) = broadcast::channel(8);
        let mut sub = forward(ChannelFilter::new("messages", "chat_id", "c1"), hub.subscribe());

        hub.send(RowEvent {
            table: "messages".to_owned(),
            row: json!({"chat_id": "c2", "id": 1}),
        })
        .unwrap();
        hub.send(RowEvent {
            table: "messages".to_owned(),
            row: json!({"chat_id": "c1", "id": 2}),
        })
        .unwrap();

        let event = sub.next().await.unwrap();
        assert_eq!(event.row["id"], 2);
    }
}
