//! In-memory replay source: one FIFO of pending responses per identifier.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::identifier::Identifier;
use crate::stub::Stub;
use crate::stub::StubResponse;

/// Result of a queue lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Oldest pending response, now removed from the queue.
    Hit(StubResponse),
    /// The identifier had fixtures, but all of them were consumed.
    Exhausted,
    /// Nothing was ever enqueued for the identifier.
    Unknown,
}

impl Lookup {
    pub fn into_hit(self) -> Option<StubResponse> {
        match self {
            Self::Hit(response) => Some(response),
            Self::Exhausted | Self::Unknown => None,
        }
    }
}

/// Per-identifier FIFO. Every dequeue is atomic, so concurrent callers never
/// receive the same stored response.
#[derive(Debug, Default)]
pub struct StubQueue {
    entries: Mutex<HashMap<Identifier, VecDeque<StubResponse>>>,
}

impl StubQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<Identifier, VecDeque<StubResponse>>> {
        // A panic while holding the lock cannot leave a half-applied push/pop.
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn enqueue(&self, stub: Stub) {
        self.entries()
            .entry(stub.identifier)
            .or_default()
            .push_back(stub.response);
    }

    /// Enqueue in iteration order.
    pub fn enqueue_all(&self, stubs: impl IntoIterator<Item = Stub>) {
        let mut entries = self.entries();
        for stub in stubs {
            entries
                .entry(stub.identifier)
                .or_default()
                .push_back(stub.response);
        }
    }

    pub fn dequeue(&self, identifier: &Identifier) -> Lookup {
        match self.entries().get_mut(identifier) {
            None => Lookup::Unknown,
            Some(pending) => pending.pop_front().map_or(Lookup::Exhausted, Lookup::Hit),
        }
    }

    /// Pending responses for one identifier.
    pub fn remaining(&self, identifier: &Identifier) -> usize {
        self.entries().get(identifier).map_or(0, VecDeque::len)
    }

    /// Pending responses across all identifiers.
    pub fn len(&self) -> usize {
        self.entries().values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries().clear();
    }
}
