use log::debug;
use parking_lot::Mutex;
use tokio::sync::watch;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FeedStatus {
    #[default]
    Idle,
    Loading,
    Refreshing,
    Error,
}

/// Proof of having started an operation that reports into a [`StatusCell`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

/// Feed status where the operation started last decides the outcome.
///
/// `begin` hands out increasing tickets. Only the holder of the newest
/// ticket may `settle`; older operations finish silently.
#[derive(Debug)]
pub struct StatusCell {
    latest: Mutex<u64>,
    status: watch::Sender<FeedStatus>,
}

impl Default for StatusCell {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusCell {
    pub fn new() -> Self {
        Self {
            latest: Mutex::new(0),
            status: watch::Sender::new(FeedStatus::Idle),
        }
    }

    pub fn begin(&self, status: FeedStatus) -> Ticket {
        let mut latest = self.latest.lock();
        *latest += 1;
        self.status.send_replace(status);
        Ticket(*latest)
    }

    /// Returns whether the status was written.
    pub fn settle(&self, ticket: Ticket, status: FeedStatus) -> bool {
        let latest = self.latest.lock();
        if ticket.0 != *latest {
            debug!(
                "Dropping {:?} from superseded operation {} (latest {})",
                status, ticket.0, *latest
            );
            return false;
        }
        self.status.send_replace(status);
        true
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedStatus> {
        self.status.subscribe()
    }

    pub fn current(&self) -> FeedStatus {
        *self.status.borrow()
    }
}
