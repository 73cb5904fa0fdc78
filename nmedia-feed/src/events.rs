use log::{debug, warn};
use nmedia_msg::Post;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::{MutationError, SaveError};

/// One-shot notifications for the presentation layer. Delivered once, never
/// replayed.
#[derive(Clone, Debug)]
pub enum FeedEvent {
    PostSaved(Post),
    SaveFailed(SaveError),
    MutationFailed(MutationError),
}

/// Hands [`FeedEvent`]s to a single bounded receiver.
///
/// Nothing is queued until the receiver is taken. Once it is, an event that
/// finds the buffer full is dropped.
#[derive(Debug)]
pub struct EventSink {
    capacity: usize,
    sender: Mutex<Option<mpsc::Sender<FeedEvent>>>,
}

impl EventSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            sender: Mutex::new(None),
        }
    }

    /// The receiver. Only the first call gets it.
    pub fn take(&self) -> Option<mpsc::Receiver<FeedEvent>> {
        let mut sender = self.sender.lock();
        if sender.is_some() {
            return None;
        }
        let (tx, rx) = mpsc::channel(self.capacity);
        *sender = Some(tx);
        Some(rx)
    }

    pub fn emit(&self, event: FeedEvent) {
        let sender = self.sender.lock();
        let sender = match sender.as_ref() {
            Some(sender) => sender,
            None => {
                debug!("No event receiver yet, dropping {:?}", event);
                return;
            }
        };
        match sender.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!("Event buffer full, dropping {:?}", event);
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                debug!("Event receiver gone, dropping {:?}", event);
            }
        }
    }
}
