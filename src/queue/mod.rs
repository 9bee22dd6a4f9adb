pub mod worker;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::TaskMessage;

pub use worker::{Worker, WorkerReport};

/// Receiving half of the work queue, consumed by a [`Worker`].
pub type TaskReceiver = mpsc::Receiver<Vec<u8>>;

/// Producer side of an in-process work queue carrying JSON task messages.
/// Each message is delivered to exactly one receiver.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::Sender<Vec<u8>>,
}

impl TaskQueue {
    pub fn channel(capacity: usize) -> (Self, TaskReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Enqueues an analysis of `repo_url` under a fresh task id.
    pub async fn submit(&self, repo_url: &str) -> Result<String> {
        let task = TaskMessage::new(Uuid::new_v4().to_string(), repo_url);
        let payload = serde_json::to_vec(&task)?;
        self.publish(payload).await?;
        tracing::info!("Published task {} for repo {}", task.task_id, repo_url);
        Ok(task.task_id)
    }

    pub async fn publish(&self, payload: Vec<u8>) -> Result<()> {
        self.tx.send(payload).await.map_err(|_| Error::QueueClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_submit_produces_task_message() {
        let (queue, mut rx) = TaskQueue::channel(4);
        let task_id = queue
            .submit("https://github.com/acme/widgets")
            .await
            .unwrap();

        let payload = rx.recv().await.unwrap();
        let task = TaskMessage::from_slice(&payload).unwrap();
        assert_eq!(task.task_id, task_id);
        assert_eq!(task.repo_url, "https://github.com/acme/widgets");
    }

    #[tokio::test]
    async fn test_publish_after_close_fails() {
        let (queue, rx) = TaskQueue::channel(1);
        drop(rx);
        assert!(matches!(
            queue.publish(b"{}".to_vec()).await,
            Err(Error::QueueClosed)
        ));
    }
}
