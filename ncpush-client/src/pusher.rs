//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug_span, info, warn};

use crate::datastore::Target;
use crate::debug::Debug;
use crate::error::{Error, Result};
use crate::iosxe;
use crate::payload::{EditPayload, PayloadSource};
use crate::session::Session;
use crate::transaction::{Outcome, Transaction, TransactionReport};
use crate::transport::Transport;

// Push options.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PushOptions {
    // Datastore to edit. When unset, the target is selected from the device
    // capabilities.
    pub target: Option<Target>,
    // Copy the running configuration to startup after a commit.
    pub save_config: bool,
    pub lock_retry: LockRetry,
}

// Retry policy for contended datastore locks.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LockRetry {
    // Total number of lock attempts.
    pub attempts: u32,
    pub backoff_ms: u64,
    pub max_backoff_ms: u64,
}

// Configuration pusher.
#[derive(Debug, Default)]
pub struct Pusher {
    options: PushOptions,
}

// Outcome of a push to one device.
#[derive(Clone, Debug)]
#[derive(Serialize)]
pub struct PushReport {
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<u32>,
    pub date: DateTime<Utc>,
    #[serde(flatten)]
    pub transaction: TransactionReport,
    // Whether the running configuration was saved to startup.
    pub saved: bool,
}

// ===== impl PushOptions =====

impl Default for PushOptions {
    fn default() -> PushOptions {
        PushOptions {
            target: None,
            save_config: false,
            lock_retry: Default::default(),
        }
    }
}

// ===== impl LockRetry =====

impl LockRetry {
    // Retry policy with a single attempt.
    pub fn disabled() -> LockRetry {
        LockRetry {
            attempts: 1,
            ..Default::default()
        }
    }

    // Delay before the given retry (starting at one), doubling each time.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor =
            1u64.checked_shl(retry.saturating_sub(1)).unwrap_or(u64::MAX);
        let backoff = self.backoff_ms.saturating_mul(factor);
        Duration::from_millis(backoff.min(self.max_backoff_ms))
    }
}

impl Default for LockRetry {
    fn default() -> LockRetry {
        LockRetry {
            attempts: 3,
            backoff_ms: 500,
            max_backoff_ms: 8000,
        }
    }
}

// ===== impl Pusher =====

impl Pusher {
    pub fn new(options: PushOptions) -> Pusher {
        Pusher { options }
    }

    // Pushes the payloads produced by the source to one device.
    //
    // The session is opened over the given transport and is always closed
    // before returning.
    pub fn push<T, P>(
        &self,
        host: &str,
        transport: T,
        source: &mut P,
    ) -> Result<PushReport>
    where
        T: Transport,
        P: PayloadSource + ?Sized,
    {
        let span = debug_span!("push", %host);
        let _span_guard = span.enter();

        // Render everything before touching the device.
        let payloads = source.payloads()?;

        let mut session = Session::open(host, transport)?;
        let result = self.push_session(&mut session, &payloads);
        if let Err(error) = session.close() {
            warn!(%error, "failed to close session");
        }
        result
    }

    // Pushes the payloads over an already open session.
    pub fn push_session<T: Transport>(
        &self,
        session: &mut Session<T>,
        payloads: &[EditPayload],
    ) -> Result<PushReport> {
        let capabilities = session.capabilities()?;
        let target = match self.options.target {
            Some(target) if !capabilities.supports(target) => {
                return Err(Error::TargetNotSupported(target));
            }
            Some(target) => target,
            None => capabilities.select_target()?,
        };
        Debug::TargetSelect(target).log();

        let transaction = Transaction::new(target);
        let report = self.run_with_retry(&transaction, session, payloads)?;

        let saved =
            self.options.save_config && report.outcome == Outcome::Committed;
        if saved {
            iosxe::save_config(session)?;
            info!("running configuration saved to startup");
        }

        Ok(PushReport {
            host: session.host().to_owned(),
            session_id: session.session_id(),
            date: Utc::now(),
            transaction: report,
            saved,
        })
    }

    fn run_with_retry<T: Transport>(
        &self,
        transaction: &Transaction,
        session: &mut Session<T>,
        payloads: &[EditPayload],
    ) -> Result<TransactionReport> {
        let retry = &self.options.lock_retry;
        let mut attempt = 1;
        loop {
            match transaction.run(session, payloads) {
                Err(error) if error.is_retryable() && attempt < retry.attempts => {
                    let backoff = retry.backoff(attempt);
                    warn!(%attempt, ?backoff, %error, "retrying transaction");
                    std::thread::sleep(backoff);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

// ===== unit tests =====
