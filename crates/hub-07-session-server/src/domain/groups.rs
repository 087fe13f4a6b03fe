//! Session groups.
//!
//! Sessions opened within the same time window share a group, and every
//! request of a group runs under the group's semaphore. A burst from one
//! window of connections queues behind itself instead of starving
//! sessions from other windows.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

/// Concurrent requests per group.
pub const GROUP_CONCURRENCY: usize = 20;

/// Length of the window that buckets new sessions into one group.
pub const GROUP_WINDOW: Duration = Duration::from_secs(900);

/// Groups with at most this many sessions are merged by the reaper.
pub const SMALL_GROUP: usize = 5;

#[derive(Debug)]
pub struct SessionGroup {
    pub gid: u64,
    pub semaphore: Semaphore,
}

impl SessionGroup {
    pub fn new(gid: u64) -> Self {
        Self {
            gid,
            semaphore: Semaphore::new(GROUP_CONCURRENCY),
        }
    }
}

/// Hands out the group for the current window.
#[derive(Debug)]
pub struct GroupAssigner {
    window: Duration,
    current: Arc<SessionGroup>,
}

impl GroupAssigner {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            current: Arc::new(SessionGroup::new(0)),
        }
    }

    /// Group for a session opened `since_start` after the server started.
    pub fn assign(&mut self, since_start: Duration) -> Arc<SessionGroup> {
        let gid = since_start.as_secs() / self.window.as_secs().max(1);
        if self.current.gid != gid {
            self.current = Arc::new(SessionGroup::new(gid));
        }
        self.current.clone()
    }
}

/// Given session counts per group id, the small groups to fold and the
/// newest small group they fold into. `None` unless two or more are small.
pub fn consolidate(sizes: &HashMap<u64, usize>) -> Option<(Vec<u64>, u64)> {
    let mut small: Vec<u64> = sizes
        .iter()
        .filter(|(_, &count)| count <= SMALL_GROUP)
        .map(|(&gid, _)| gid)
        .collect();
    if small.len() < 2 {
        return None;
    }
    small.sort_unstable();
    let target = *small.last()?;
    small.pop();
    Some((small, target))
}
