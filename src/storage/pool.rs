//! Bounded connection pool shared by storage adapters (spec.md §5: "index
//! adapters own their own connection pools with bounded size (min 2, max 10
//! by default, configurable)").

use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;

/// A fixed-size pool of `T`, handed out as guards that return their value
/// to the pool on drop. `T` is created eagerly up to `min_size` at
/// construction and lazily up to `max_size` on demand.
pub struct ConnectionPool<T> {
    idle_tx: Sender<T>,
    idle_rx: Receiver<T>,
    factory: Arc<dyn Fn() -> T + Send + Sync>,
    outstanding: Arc<Mutex<usize>>,
    max_size: usize,
}

pub struct PooledConnection<T> {
    value: Option<T>,
    idle_tx: Sender<T>,
    outstanding: Arc<Mutex<usize>>,
}

impl<T> std::ops::Deref for PooledConnection<T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.value.as_ref().expect("value taken only on drop")
    }
}

impl<T> std::ops::DerefMut for PooledConnection<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.value.as_mut().expect("value taken only on drop")
    }
}

impl<T> Drop for PooledConnection<T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            let _ = self.idle_tx.send(value);
        }
        *self.outstanding.lock() -= 1;
    }
}

impl<T: Send + 'static> ConnectionPool<T> {
    pub fn new(min_size: usize, max_size: usize, factory: impl Fn() -> T + Send + Sync + 'static) -> Self {
        let max_size = max_size.max(min_size).max(1);
        let (idle_tx, idle_rx) = bounded(max_size);
        let factory: Arc<dyn Fn() -> T + Send + Sync> = Arc::new(factory);
        for _ in 0..min_size {
            let _ = idle_tx.send(factory());
        }
        Self { idle_tx, idle_rx, factory, outstanding: Arc::new(Mutex::new(0)), max_size }
    }

    /// Returns an idle connection, or creates a fresh one if under
    /// `max_size` and none are idle.
    pub fn acquire(&self) -> PooledConnection<T> {
        let value = match self.idle_rx.try_recv() {
            Ok(v) => v,
            Err(_) => {
                let mut outstanding = self.outstanding.lock();
                if *outstanding < self.max_size {
                    *outstanding += 1;
                    drop(outstanding);
                    return PooledConnection {
                        value: Some((self.factory)()),
                        idle_tx: self.idle_tx.clone(),
                        outstanding: self.outstanding.clone(),
                    };
                }
                drop(outstanding);
                self.idle_rx.recv().expect("pool sender never dropped while pool is alive")
            }
        };
        *self.outstanding.lock() += 1;
        PooledConnection { value: Some(value), idle_tx: self.idle_tx.clone(), outstanding: self.outstanding.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn reuses_returned_connections() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();
        let pool = ConnectionPool::new(1, 2, move || counter_clone.fetch_add(1, Ordering::SeqCst));
        {
            let _conn = pool.acquire();
        }
        let _conn2 = pool.acquire();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
