use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::mode::ThemeMode;

type Callback = Arc<dyn Fn(ThemeMode) + Send + Sync>;

struct Shared {
    mode: Mutex<ThemeMode>,
    subscribers: Mutex<Vec<(u64, Callback)>>,
    next_id: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Shared handle to the theme flag.
///
/// Clones point at the same flag. Writers call [`ThemeCell::set`] or
/// [`ThemeCell::toggle`]; readers either sample [`ThemeCell::get`] or register
/// a callback with [`ThemeCell::subscribe`]. Callbacks run on the writer's
/// thread, after the new value is visible to `get`, and only when the value
/// actually changed.
#[derive(Clone)]
pub struct ThemeCell {
    shared: Arc<Shared>,
}

impl ThemeCell {
    pub fn new(mode: ThemeMode) -> Self {
        Self {
            shared: Arc::new(Shared {
                mode: Mutex::new(mode),
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    pub fn get(&self) -> ThemeMode {
        *lock(&self.shared.mode)
    }

    pub fn is_dark(&self) -> bool {
        self.get().is_dark()
    }

    /// Stores `mode`; returns `true` when subscribers were notified.
    pub fn set(&self, mode: ThemeMode) -> bool {
        {
            let mut current = lock(&self.shared.mode);
            if *current == mode {
                return false;
            }
            *current = mode;
        }
        tracing::debug!(theme = %mode, "theme changed");
        self.notify(mode);
        true
    }

    /// Flips the flag and returns the new mode.
    pub fn toggle(&self) -> ThemeMode {
        let next = {
            let mut current = lock(&self.shared.mode);
            *current = current.toggle();
            *current
        };
        tracing::debug!(theme = %next, "theme toggled");
        self.notify(next);
        next
    }

    /// Registers `callback` for future changes. The callback stays registered
    /// until the returned [`Subscription`] is cancelled or dropped.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(ThemeMode) + Send + Sync + 'static,
    {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.shared.subscribers).push((id, Arc::new(callback)));
        Subscription {
            shared: Arc::downgrade(&self.shared),
            id: Some(id),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.shared.subscribers).len()
    }

    fn notify(&self, mode: ThemeMode) {
        // Snapshot so callbacks may subscribe/unsubscribe without deadlocking.
        let callbacks: Vec<Callback> = lock(&self.shared.subscribers)
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in callbacks {
            callback(mode);
        }
    }
}

impl std::fmt::Debug for ThemeCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThemeCell")
            .field("mode", &self.get())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Registration returned by [`ThemeCell::subscribe`].
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    shared: Weak<Shared>,
    id: Option<u64>,
}

impl Subscription {
    /// Stops delivery. Safe to call more than once.
    pub fn cancel(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        if let Some(shared) = self.shared.upgrade() {
            lock(&shared.subscribers).retain(|(existing, _)| *existing != id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.id.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn set_notifies_only_on_change() {
        let cell = ThemeCell::new(ThemeMode::Dark);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let _sub = cell.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!cell.set(ThemeMode::Dark));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(cell.set(ThemeMode::Light));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cell.get(), ThemeMode::Light);
    }

    #[test]
    fn callbacks_observe_new_value() {
        let cell = ThemeCell::new(ThemeMode::Light);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reader = cell.clone();
        let _sub = cell.subscribe(move |mode| {
            sink.lock().unwrap().push((mode, reader.get()));
        });

        cell.toggle();
        cell.toggle();
        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                (ThemeMode::Dark, ThemeMode::Dark),
                (ThemeMode::Light, ThemeMode::Light)
            ]
        );
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let cell = ThemeCell::new(ThemeMode::Dark);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let sub = cell.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(cell.subscriber_count(), 1);
        drop(sub);
        assert_eq!(cell.subscriber_count(), 0);
        cell.toggle();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancel_is_idempotent_and_survives_cell_drop() {
        let cell = ThemeCell::new(ThemeMode::Dark);
        let mut sub = cell.subscribe(|_| {});
        sub.cancel();
        sub.cancel();
        assert!(!sub.is_active());

        let mut orphan = cell.subscribe(|_| {});
        drop(cell);
        orphan.cancel();
        assert!(!orphan.is_active());
    }
}
