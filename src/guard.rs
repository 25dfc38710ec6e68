use std::cell::Cell;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Synchronizing,
}

/// Single serialization point for every path that writes shared vitals.
///
/// Acquiring returns a [`SyncPass`]; the guard goes back to `Idle` when the
/// pass is dropped, so early returns and unwinding release it too.
#[derive(Debug)]
pub struct ReentrancyGuard {
    state: Cell<SyncState>,
}

impl Default for ReentrancyGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self {
            state: Cell::new(SyncState::Idle),
        }
    }

    pub fn state(&self) -> SyncState {
        self.state.get()
    }

    pub fn is_held(&self) -> bool {
        self.state.get() == SyncState::Synchronizing
    }

    pub fn try_acquire(&self) -> Option<SyncPass<'_>> {
        if self.is_held() {
            return None;
        }
        self.state.set(SyncState::Synchronizing);
        Some(SyncPass { guard: self })
    }
}

#[derive(Debug)]
pub struct SyncPass<'a> {
    guard: &'a ReentrancyGuard,
}

impl Drop for SyncPass<'_> {
    fn drop(&mut self) {
        self.guard.state.set(SyncState::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_while_pass_is_alive() {
        let guard = ReentrancyGuard::new();
        let pass = guard.try_acquire();
        assert!(pass.is_some());
        assert!(guard.try_acquire().is_none());
        drop(pass);
        assert_eq!(guard.state(), SyncState::Idle);
        assert!(guard.try_acquire().is_some());
    }

    #[test]
    fn early_return_releases_guard() {
        fn bail(guard: &ReentrancyGuard) -> Option<()> {
            let _pass = guard.try_acquire()?;
            None
        }
        let guard = ReentrancyGuard::new();
        assert!(bail(&guard).is_none());
        assert!(!guard.is_held());
    }
}
