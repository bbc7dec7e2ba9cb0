//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::ops::{Deref, DerefMut};

use tracing::warn;

use crate::datastore::Target;
use crate::debug::Debug;
use crate::error::{Error, Phase, Result};
use crate::rpc::{Rpc, RpcReply};
use crate::session::Session;
use crate::transport::Transport;

/// Scoped datastore lock.
///
/// The guard dereferences to the session so that requests can be issued
/// while the lock is held. [`LockGuard::release`] must be called to observe
/// unlock failures; a guard dropped without being released still unlocks the
/// datastore, logging any failure.
#[derive(Debug)]
pub struct LockGuard<'a, T: Transport> {
    session: &'a mut Session<T>,
    target: Target,
    released: bool,
}

// ===== impl LockGuard =====

impl<'a, T: Transport> LockGuard<'a, T> {
    // Locks the target datastore.
    //
    // A lock held by another session is reported as `LockContention` and is
    // never retried here.
    pub fn acquire(
        session: &'a mut Session<T>,
        target: Target,
    ) -> Result<LockGuard<'a, T>> {
        if let Some(held) = session.lock {
            return Err(Error::AlreadyLocked(held));
        }

        match session.execute(Rpc::Lock(target), Phase::Lock)? {
            RpcReply::Errors(errors)
                if errors.iter().any(|error| error.is_lock_denied()) =>
            {
                return Err(Error::LockContention(target, errors));
            }
            RpcReply::Errors(errors) => {
                return Err(Error::RpcFailed(Phase::Lock, errors));
            }
            _ => (),
        }

        session.lock = Some(target);
        Debug::LockAcquire(target).log();

        Ok(LockGuard {
            session,
            target,
            released: false,
        })
    }

    pub fn target(&self) -> Target {
        self.target
    }

    // Unlocks the target datastore.
    //
    // Any failure is reported as `UnlockFailed`, since the device may be left
    // locked.
    pub fn release(mut self) -> Result<()> {
        self.unlock().map_err(|error| Error::UnlockFailed {
            error: Box::new(error),
            prior: None,
            report: None,
        })
    }

    fn unlock(&mut self) -> Result<()> {
        // Unlock is attempted once, whatever its result.
        self.released = true;
        self.session.lock = None;

        self.session
            .execute(Rpc::Unlock(self.target), Phase::Unlock)?
            .into_result(Phase::Unlock)?;
        Debug::LockRelease(self.target).log();
        Ok(())
    }
}

impl<T: Transport> Deref for LockGuard<'_, T> {
    type Target = Session<T>;

    fn deref(&self) -> &Session<T> {
        self.session
    }
}

impl<T: Transport> DerefMut for LockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Session<T> {
        self.session
    }
}

impl<T: Transport> Drop for LockGuard<'_, T> {
    fn drop(&mut self) {
        if !self.released
            && let Err(error) = self.unlock()
        {
            warn!(datastore = %self.target, %error, "failed to release lock");
        }
    }
}
