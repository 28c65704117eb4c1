//! Simple stateless pub-sub event handler
//!
//! The handler has no access to the internal state of the engine. All it receives is the event itself. Handlers can
//! be async, and each event is handled on its own task.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{sync::mpsc, task::JoinSet};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    name: &'static str,
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(name: &'static str, buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        Self { name, listener: receiver, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.name, self.sender.clone())
    }

    /// Runs until every producer has been dropped, then waits for the in-flight handlers to finish.
    ///
    /// Returns the number of events handled.
    pub async fn start_handler(mut self) -> usize {
        debug!("📬️ Starting {} event handler", self.name);
        // Only the producers keep the channel open from here on
        drop(self.sender);
        let mut jobs = JoinSet::new();
        let mut handled = 0;
        while let Some(ev) = self.listener.recv().await {
            trace!("📬️ Handling {} event", self.name);
            let handler = Arc::clone(&self.handler);
            jobs.spawn(async move { (handler)(ev).await });
            handled += 1;
            // Reap finished jobs so the set does not grow without bound
            while let Some(res) = jobs.try_join_next() {
                log_join_result(self.name, res);
            }
        }
        debug!("📬️ {} event handler waiting for {} job(s) to complete", self.name, jobs.len());
        while let Some(res) = jobs.join_next().await {
            log_join_result(self.name, res);
        }
        debug!("📬️ {} event handler has shut down after {handled} event(s)", self.name);
        handled
    }
}

fn log_join_result(name: &str, res: Result<(), tokio::task::JoinError>) {
    if let Err(e) = res {
        warn!("📬️ A {name} event hook did not complete: {e}");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    name: &'static str,
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(name: &'static str, sender: mpsc::Sender<E>) -> Self {
        Self { name, sender }
    }

    /// Queues the event without waiting. If the buffer is full or the handler has gone away, the event is dropped.
    pub fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.try_send(event) {
            error!("📬️ Failed to send {} event: {e}", self.name);
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    #[tokio::test]
    async fn test_event_handler() {
        let _ = env_logger::try_init();
        let count = Arc::new(AtomicU64::new(0));
        let c2 = count.clone();
        let handler = Arc::new(move |v| {
            let count = count.clone();
            Box::pin(async move {
                tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
                let _ = count.fetch_add(v, Ordering::SeqCst);
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let event_handler = EventHandler::new("test", 16, handler);
        let producer_1 = event_handler.subscribe();
        let producer_2 = event_handler.subscribe();
        let run = tokio::spawn(event_handler.start_handler());
        for i in 0..5 {
            producer_1.publish_event(i * 2 + 1);
            producer_2.publish_event(i * 2);
        }
        drop(producer_1);
        drop(producer_2);
        let handled = run.await.unwrap();
        assert_eq!(handled, 10);
        assert_eq!(c2.load(Ordering::SeqCst), 45);
    }

    #[tokio::test]
    async fn full_buffer_drops_events() {
        let _ = env_logger::try_init();
        let handler: Handler<u64> = Arc::new(|_| Box::pin(async {}));
        let event_handler = EventHandler::new("test", 1, handler);
        let producer = event_handler.subscribe();
        // Nothing is draining the channel yet
        producer.publish_event(1);
        producer.publish_event(2);
        drop(producer);
        assert_eq!(event_handler.start_handler().await, 1);
    }
}
