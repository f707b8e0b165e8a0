//! Per-chat serial lanes.
//!
//! Each chat gets one worker task fed by an unbounded queue, so events of a
//! chat are handled in arrival order while different chats run concurrently.
//! A worker that sits idle retires and removes its own queue. Closing the
//! lanes lets every worker finish what is already queued.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio::time::timeout;

use crate::channels::InboundEvent;

type LaneMap = Arc<Mutex<HashMap<String, mpsc::UnboundedSender<InboundEvent>>>>;

pub struct ChatLanes<F> {
    lanes: LaneMap,
    idle: Duration,
    handler: Arc<F>,
    workers: Mutex<JoinSet<()>>,
}

impl<F, Fut> ChatLanes<F>
where
    F: Fn(InboundEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    pub fn new(idle: Duration, handler: F) -> Self {
        Self {
            lanes: Arc::new(Mutex::new(HashMap::new())),
            idle,
            handler: Arc::new(handler),
            workers: Mutex::new(JoinSet::new()),
        }
    }

    /// Queue an event on its chat's lane, starting the lane if needed.
    pub async fn dispatch(&self, event: InboundEvent) {
        // Held across the send so a retiring lane cannot miss the event.
        let mut lanes = self.lanes.lock().await;

        let event = match lanes.get(&event.chat_id) {
            Some(tx) => match tx.send(event) {
                Ok(()) => return,
                // Worker died; start a fresh one below.
                Err(mpsc::error::SendError(event)) => event,
            },
            None => event,
        };

        let chat_id = event.chat_id.clone();
        let (tx, rx) = mpsc::unbounded_channel();
        if tx.send(event).is_err() {
            return;
        }
        lanes.insert(chat_id.clone(), tx);
        tracing::debug!(%chat_id, "Lane started");

        let mut workers = self.workers.lock().await;
        // Reap retired workers so the set only tracks live lanes.
        while workers.try_join_next().is_some() {}
        workers.spawn(run_lane(
            chat_id,
            rx,
            Arc::clone(&self.lanes),
            self.idle,
            Arc::clone(&self.handler),
        ));
    }

    /// Stop accepting events and wait until every queued event is handled.
    pub async fn close(self) {
        // Dropping the senders ends each worker once its queue is empty.
        self.lanes.lock().await.clear();

        let mut workers = self.workers.into_inner();
        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                tracing::error!("Lane worker failed: {e}");
            }
        }
    }

    /// Number of live lanes.
    pub async fn active(&self) -> usize {
        self.lanes.lock().await.len()
    }
}

async fn run_lane<F, Fut>(
    chat_id: String,
    mut rx: mpsc::UnboundedReceiver<InboundEvent>,
    lanes: LaneMap,
    idle: Duration,
    handler: Arc<F>,
) where
    F: Fn(InboundEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    loop {
        let event = match timeout(idle, rx.recv()).await {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(_) => {
                let mut lanes = lanes.lock().await;
                // An event may have landed between the timeout and the lock.
                match rx.try_recv() {
                    Ok(event) => event,
                    Err(_) => {
                        lanes.remove(&chat_id);
                        tracing::debug!(%chat_id, "Lane retired after idle timeout");
                        break;
                    }
                }
            }
        };

        handler(event).await;
    }
}
