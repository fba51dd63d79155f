use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

/// Mutual-exclusion discipline used by a [`crate::CacheStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockStrategy {
    /// One exclusive lock for readers and writers alike.
    Monitor,
    /// Concurrent readers, exclusive writers.
    #[default]
    ReaderWriter,
}

impl LockStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monitor => "monitor",
            Self::ReaderWriter => "reader_writer",
        }
    }
}

impl std::fmt::Display for LockStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LockStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "monitor" | "mutex" | "exclusive" => Ok(Self::Monitor),
            "reader_writer" | "rwlock" | "rw" => Ok(Self::ReaderWriter),
            other => Err(format!("unknown lock strategy `{other}`")),
        }
    }
}

/// Data guarded by the lock named in its [`LockStrategy`].
///
/// All access goes through closures so the guard is always scoped: it is
/// released when the closure returns, errors out, or unwinds.
pub enum StrategyLock<T> {
    Monitor(Mutex<T>),
    ReaderWriter(RwLock<T>),
}

impl<T> StrategyLock<T> {
    pub fn new(strategy: LockStrategy, value: T) -> Self {
        match strategy {
            LockStrategy::Monitor => Self::Monitor(Mutex::new(value)),
            LockStrategy::ReaderWriter => Self::ReaderWriter(RwLock::new(value)),
        }
    }

    pub fn strategy(&self) -> LockStrategy {
        match self {
            Self::Monitor(_) => LockStrategy::Monitor,
            Self::ReaderWriter(_) => LockStrategy::ReaderWriter,
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        match self {
            Self::Monitor(lock) => f(&lock.lock()),
            Self::ReaderWriter(lock) => f(&lock.read()),
        }
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        match self {
            Self::Monitor(lock) => f(&mut lock.lock()),
            Self::ReaderWriter(lock) => f(&mut lock.write()),
        }
    }

    /// Optimistic read followed by a verified write.
    ///
    /// `probe` runs under shared access first. If it yields nothing the lock
    /// is escalated to exclusive access, `probe` runs again to catch a racing
    /// writer, and only then does `escalate` run. Under [`LockStrategy::Monitor`]
    /// both steps happen under the single exclusive lock.
    pub fn read_or_write<R>(
        &self,
        probe: impl Fn(&T) -> Option<R>,
        escalate: impl FnOnce(&mut T) -> R,
    ) -> R {
        match self {
            Self::Monitor(lock) => {
                let mut guard = lock.lock();
                match probe(&guard) {
                    Some(found) => found,
                    None => escalate(&mut guard),
                }
            }
            Self::ReaderWriter(lock) => {
                let found = probe(&lock.read());
                if let Some(found) = found {
                    return found;
                }
                let mut guard = lock.write();
                match probe(&guard) {
                    Some(found) => found,
                    None => escalate(&mut guard),
                }
            }
        }
    }

    pub fn get_mut(&mut self) -> &mut T {
        match self {
            Self::Monitor(lock) => lock.get_mut(),
            Self::ReaderWriter(lock) => lock.get_mut(),
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Self::Monitor(lock) => lock.into_inner(),
            Self::ReaderWriter(lock) => lock.into_inner(),
        }
    }

    /// Re-wraps the guarded data under another strategy.
    ///
    /// Takes `&mut self`, so no reader or writer can hold the lock meanwhile.
    pub fn switch(&mut self, strategy: LockStrategy)
    where
        T: Default,
    {
        if self.strategy() == strategy {
            return;
        }
        let value = std::mem::take(self.get_mut());
        *self = Self::new(strategy, value);
    }
}

impl<T: Default> Default for StrategyLock<T> {
    fn default() -> Self {
        Self::new(LockStrategy::default(), T::default())
    }
}

impl<T> std::fmt::Debug for StrategyLock<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyLock")
            .field("strategy", &self.strategy())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    #[test]
    fn strategy_parses_aliases() {
        assert_eq!("monitor".parse::<LockStrategy>(), Ok(LockStrategy::Monitor));
        assert_eq!(
            "Reader-Writer".parse::<LockStrategy>(),
            Ok(LockStrategy::ReaderWriter)
        );
        assert!("spin".parse::<LockStrategy>().is_err());
    }

    #[test]
    fn lock_is_released_after_panic() {
        for strategy in [LockStrategy::Monitor, LockStrategy::ReaderWriter] {
            let lock = StrategyLock::new(strategy, 0_u32);
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                lock.write(|value| {
                    *value += 1;
                    if *value > 0 {
                        panic!("boom");
                    }
                });
            }));
            assert!(outcome.is_err());
            assert_eq!(lock.read(|value| *value), 1);
            lock.write(|value| *value += 1);
            assert_eq!(lock.read(|value| *value), 2);
        }
    }

    #[test]
    fn read_or_write_skips_escalation_on_hit() {
        let lock = StrategyLock::new(LockStrategy::ReaderWriter, Some(7));
        let got = lock.read_or_write(|v| *v, |_| panic!("should not escalate"));
        assert_eq!(got, 7);

        let empty: StrategyLock<Option<i32>> = StrategyLock::new(LockStrategy::Monitor, None);
        let got = empty.read_or_write(
            |v| *v,
            |v| {
                *v = Some(3);
                3
            },
        );
        assert_eq!(got, 3);
        assert_eq!(empty.read(|v| *v), Some(3));
    }

    #[test]
    fn switch_preserves_contents() {
        let mut lock = StrategyLock::new(LockStrategy::Monitor, vec![1, 2, 3]);
        lock.switch(LockStrategy::ReaderWriter);
        assert_eq!(lock.strategy(), LockStrategy::ReaderWriter);
        assert_eq!(lock.read(Vec::len), 3);
    }
}
