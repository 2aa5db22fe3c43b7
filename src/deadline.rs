use std::{collections::HashMap, hash::Hash, mem};

use tokio::task::JoinHandle;

/// State of one pending entry.
///
/// An entry that is not in the table at all is the third state: nothing is
/// pending under that key.
#[derive(Debug)]
pub(crate) enum Deadline {
    /// A timer task is armed; it fires the synthetic timeout outcome.
    Armed(JoinHandle<()>),
    /// Pending without a deadline.
    Placeholder,
}
impl Deadline {
    fn cancel(self) {
        if let Deadline::Armed(task) = self {
            task.abort();
        }
    }
}

/// Pending entries keyed by id. Whoever removes an entry first owns its outcome.
#[derive(Debug)]
pub(crate) struct DeadlineTable<K> {
    entries: HashMap<K, Deadline>,
}

impl<K: Eq + Hash> DeadlineTable<K> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn insert_placeholder(&mut self, key: K) {
        self.insert(key, Deadline::Placeholder);
    }

    /// Installs a timer for a key already inserted as a placeholder.
    ///
    /// If the key was claimed in the meantime the timer is aborted instead.
    pub fn arm(&mut self, key: &K, task: JoinHandle<()>) {
        match self.entries.get_mut(key) {
            Some(d) => mem::replace(d, Deadline::Armed(task)).cancel(),
            None => task.abort(),
        }
    }

    fn insert(&mut self, key: K, deadline: Deadline) {
        if let Some(old) = self.entries.insert(key, deadline) {
            old.cancel();
        }
    }

    /// Removes the entry and cancels its timer. Returns `false` if it was already gone.
    pub fn claim(&mut self, key: &K) -> bool {
        match self.entries.remove(key) {
            Some(d) => {
                d.cancel();
                true
            }
            None => false,
        }
    }
}

impl<K> Drop for DeadlineTable<K> {
    fn drop(&mut self) {
        for (_, d) in self.entries.drain() {
            d.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicBool, Ordering},
        },
        time::Duration,
    };

    use tokio::{spawn, test, time::sleep};

    use super::*;

    fn flag_task(fired: &Arc<AtomicBool>, after: Duration) -> JoinHandle<()> {
        let fired = fired.clone();
        spawn(async move {
            sleep(after).await;
            fired.store(true, Ordering::SeqCst);
        })
    }

    #[test]
    async fn claim_exactly_once() {
        let mut t = DeadlineTable::new();
        t.insert_placeholder(1);
        assert!(t.contains(&1));
        assert!(t.claim(&1));
        assert!(!t.claim(&1));
        assert_eq!(t.len(), 0);
    }

    #[test(start_paused = true)]
    async fn claim_cancels_armed_timer() {
        let fired = Arc::new(AtomicBool::new(false));
        let mut t = DeadlineTable::new();
        t.insert_placeholder("a");
        t.arm(&"a", flag_task(&fired, Duration::from_millis(10)));
        assert!(t.claim(&"a"));
        sleep(Duration::from_millis(50)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test(start_paused = true)]
    async fn arm_after_claim_aborts() {
        let fired = Arc::new(AtomicBool::new(false));
        let mut t = DeadlineTable::<u64>::new();
        t.arm(&7, flag_task(&fired, Duration::from_millis(10)));
        assert!(!t.contains(&7));
        sleep(Duration::from_millis(50)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test(start_paused = true)]
    async fn drop_cancels_everything() {
        let fired = Arc::new(AtomicBool::new(false));
        let mut t = DeadlineTable::new();
        for key in 0..3 {
            t.insert_placeholder(key);
            t.arm(&key, flag_task(&fired, Duration::from_millis(10)));
        }
        drop(t);
        sleep(Duration::from_millis(50)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }
}
