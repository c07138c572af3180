use std::sync::{PoisonError, RwLock};

use tokio::sync::watch;

/// Observable value with a monotonically increasing version.
///
/// Writers replace or mutate the whole value under a lock, so readers always
/// observe a committed state. Subscribers receive the new version number after
/// every write.
#[derive(Debug)]
pub struct StateCell<T> {
    value: RwLock<T>,
    version: watch::Sender<u64>,
}

impl<T> StateCell<T> {
    pub fn new(value: T) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            value: RwLock::new(value),
            version,
        }
    }

    pub fn with<R>(&self, read: impl FnOnce(&T) -> R) -> R {
        let guard = self.value.read().unwrap_or_else(PoisonError::into_inner);
        read(&guard)
    }

    pub fn set(&self, value: T) {
        {
            let mut guard = self.value.write().unwrap_or_else(PoisonError::into_inner);
            *guard = value;
        }
        self.bump();
    }

    pub fn update<R>(&self, mutate: impl FnOnce(&mut T) -> R) -> R {
        let result = {
            let mut guard = self.value.write().unwrap_or_else(PoisonError::into_inner);
            mutate(&mut guard)
        };
        self.bump();
        result
    }

    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    fn bump(&self) {
        self.version.send_modify(|version| *version += 1);
    }
}

impl<T: Clone> StateCell<T> {
    pub fn get(&self) -> T {
        self.with(T::clone)
    }
}

impl<T: Default> Default for StateCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_bump_version_and_reads_see_latest_value() {
        let cell = StateCell::new(1_u32);
        assert_eq!(cell.version(), 0);

        cell.set(2);
        assert_eq!(cell.get(), 2);
        assert_eq!(cell.version(), 1);

        let doubled = cell.update(|value| {
            *value *= 2;
            *value
        });
        assert_eq!(doubled, 4);
        assert_eq!(cell.with(|value| *value + 1), 5);
        assert_eq!(cell.version(), 2);
    }

    #[tokio::test]
    async fn subscribers_are_notified_of_changes() {
        let cell = StateCell::new(String::new());
        let mut changes = cell.subscribe();

        cell.update(|value| value.push_str("hello"));
        changes.changed().await.expect("sender alive");
        assert_eq!(*changes.borrow_and_update(), 1);
        assert_eq!(cell.get(), "hello");
    }
}
