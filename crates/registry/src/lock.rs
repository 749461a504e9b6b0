use std::ops::{Deref, DerefMut};

use poker_domain::ScrumTeam;
use tokio::sync::OwnedMutexGuard;

/// Exclusive access to one team. Dropping the lock releases the team.
#[derive(Debug)]
pub struct TeamLock {
    guard: OwnedMutexGuard<ScrumTeam>,
}

impl TeamLock {
    pub(crate) const fn new(guard: OwnedMutexGuard<ScrumTeam>) -> Self {
        Self { guard }
    }
}

impl Deref for TeamLock {
    type Target = ScrumTeam;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl DerefMut for TeamLock {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}
