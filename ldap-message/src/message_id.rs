//! Message ID allocation
//!
//! Every request on a connection carries a message ID that the matching
//! response echoes back. IDs are issued by one counter per connection:
//! it starts at 0, hands out 1, 2, ... and wraps from its maximum back
//! to 1. ID 0 is never issued.

use std::sync::{Arc, Mutex, PoisonError};

/// Largest message ID, `MessageID ::= INTEGER (0 .. maxInt)`
pub const MAX_MESSAGE_ID: i32 = i32::MAX;

/// Shared message ID counter
///
/// Cloning yields another handle to the same counter, so it can be handed
/// to every task that builds requests for one connection.
///
/// # Thread Safety
/// The read-increment-wrap step runs under a single mutex; concurrent
/// callers never observe the same ID.
#[derive(Debug, Clone)]
pub struct MessageIdCounter {
    counter: Arc<Mutex<i32>>,
    max: i32,
}

impl MessageIdCounter {
    /// Create a counter starting at 0; the first ID issued is 1
    pub fn new() -> Self {
        Self::with_max(MAX_MESSAGE_ID)
    }

    /// Create a counter wrapping after `max` (at least 1)
    pub fn with_max(max: i32) -> Self {
        Self {
            counter: Arc::new(Mutex::new(0)),
            max: max.max(1),
        }
    }

    /// Create a counter whose last issued ID is `value`
    pub fn starting_at(value: i32) -> Self {
        let counter = Self::new();
        *counter.lock() = value.clamp(0, MAX_MESSAGE_ID);
        counter
    }

    // poisoned or not, the counter value is always usable
    fn lock(&self) -> std::sync::MutexGuard<'_, i32> {
        self.counter.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Last issued ID (0 before the first call to `next_id`)
    pub fn current(&self) -> i32 {
        *self.lock()
    }

    pub fn max(&self) -> i32 {
        self.max
    }

    /// Issue the next message ID
    pub fn next_id(&self) -> i32 {
        let mut counter = self.lock();
        if *counter >= self.max {
            log::debug!("message id counter wrapped after {}", *counter);
            *counter = 1;
        } else {
            *counter += 1;
        }
        *counter
    }
}

impl Default for MessageIdCounter {
    fn default() -> Self {
        Self::new()
    }
}
