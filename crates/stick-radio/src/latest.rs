//! Latest-value cells shared between the audio task and the UI task.
//!
//! Each cell has exactly one [`Publisher`] and one [`Subscriber`]; neither
//! half is `Clone`, so a field can never grow a second writer.  A publish
//! overwrites whatever the reader has not consumed yet (last write wins),
//! and [`Subscriber::take`] hands each published value to the reader at
//! most once.

use tokio::sync::watch;

/// Create a connected publisher/subscriber pair holding `initial`.
///
/// The initial value counts as already seen: `take()` returns `None`
/// until the first publish.
pub fn latest<T>(initial: T) -> (Publisher<T>, Subscriber<T>) {
    let (tx, rx) = watch::channel(Slot {
        seq: 0,
        value: initial,
    });
    (Publisher { tx }, Subscriber { rx, seen: 0 })
}

/// Same as [`latest`] but the initial value is delivered by the first
/// `take()`, as if it had just been published.
pub fn latest_pending<T>(initial: T) -> (Publisher<T>, Subscriber<T>) {
    let (tx, mut rx) = latest(initial);
    rx.seen = u64::MAX;
    (tx, rx)
}

#[derive(Debug)]
struct Slot<T> {
    seq: u64,
    value: T,
}

/// Write half.  Owned by exactly one task.
#[derive(Debug)]
pub struct Publisher<T> {
    tx: watch::Sender<Slot<T>>,
}

impl<T> Publisher<T> {
    /// Overwrite the cell and mark it changed, even if the value is equal
    /// to the previous one.
    pub fn publish(&self, value: T) {
        self.tx.send_modify(|slot| {
            slot.seq = slot.seq.wrapping_add(1);
            if slot.seq == u64::MAX {
                slot.seq = 1;
            }
            slot.value = value;
        });
    }

    /// Publish only if `value` differs from the current contents.
    /// Returns `true` if the cell changed.
    pub fn publish_if_changed(&self, value: T) -> bool
    where
        T: PartialEq,
    {
        let unchanged = self.tx.borrow().value == value;
        if unchanged {
            return false;
        }
        self.publish(value);
        true
    }

    /// The most recently published value.
    pub fn current(&self) -> T
    where
        T: Clone,
    {
        self.tx.borrow().value.clone()
    }
}

/// Read half.  Owned by exactly one task.
#[derive(Debug)]
pub struct Subscriber<T> {
    rx: watch::Receiver<Slot<T>>,
    seen: u64,
}

impl<T: Clone> Subscriber<T> {
    /// Consume the latest value if it was published since the last `take`.
    /// Still delivers a final value after the publisher has been dropped.
    pub fn take(&mut self) -> Option<T> {
        let slot = self.rx.borrow();
        if slot.seq == self.seen {
            return None;
        }
        self.seen = slot.seq;
        Some(slot.value.clone())
    }

    /// Read the current value without consuming it.
    pub fn get(&self) -> T {
        self.rx.borrow().value.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_consumes_once() {
        let (tx, mut rx) = latest(0u32);
        assert_eq!(rx.take(), None);
        tx.publish(7);
        assert_eq!(rx.take(), Some(7));
        assert_eq!(rx.take(), None);
        assert_eq!(rx.get(), 7);
    }

    #[test]
    fn test_last_write_wins() {
        let (tx, mut rx) = latest(0usize);
        tx.publish(1);
        tx.publish(0);
        assert_eq!(rx.take(), Some(0));
        assert_eq!(rx.take(), None);
    }

    #[test]
    fn test_equal_publish_still_marks_changed() {
        let (tx, mut rx) = latest(3u8);
        tx.publish(3);
        assert_eq!(rx.take(), Some(3));
    }

    #[test]
    fn test_publish_if_changed_skips_duplicates() {
        let (tx, mut rx) = latest(String::from("a"));
        assert!(!tx.publish_if_changed("a".to_string()));
        assert_eq!(rx.take(), None);
        assert!(tx.publish_if_changed("b".to_string()));
        assert_eq!(rx.take().as_deref(), Some("b"));
    }

    #[test]
    fn test_pending_initial_value() {
        let (_tx, mut rx) = latest_pending(4usize);
        assert_eq!(rx.take(), Some(4));
        assert_eq!(rx.take(), None);
    }

    #[test]
    fn test_value_survives_publisher_drop() {
        let (tx, mut rx) = latest(0);
        tx.publish(9);
        drop(tx);
        assert_eq!(rx.take(), Some(9));
    }

    #[test]
    fn test_cross_thread_delivery() {
        let (tx, mut rx) = latest(0u64);
        std::thread::spawn(move || tx.publish(42)).join().unwrap();
        assert_eq!(rx.take(), Some(42));
    }
}
