use tokio::sync::mpsc;

/// Explicitly registered downstream queues of a component
///
/// Publishing enqueues a clone on every queue and never waits. Queues whose
/// receiver is gone are dropped.
#[derive(Debug)]
pub(crate) struct Subscribers<T> {
    senders: Vec<mpsc::UnboundedSender<T>>,
}

impl<T: Clone> Subscribers<T> {
    pub(crate) fn new() -> Self {
        Self {
            senders: Vec::new(),
        }
    }

    pub(crate) fn subscribe(&mut self) -> mpsc::UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.push(tx);
        rx
    }

    pub(crate) fn publish(&mut self, value: T) {
        self.senders.retain(|tx| tx.send(value.clone()).is_ok());
    }
}
