//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use derive_new::new;
use enum_as_inner::EnumAsInner;
use serde::Serialize;
use tracing::{debug_span, warn};

use crate::datastore::Target;
use crate::debug::Debug;
use crate::error::{Error, Phase, Result, format_rpc_errors};
use crate::lock::LockGuard;
use crate::payload::EditPayload;
use crate::rpc::{Rpc, RpcError, RpcReply};
use crate::session::Session;
use crate::transport::Transport;

// Executes lock -> edits -> commit/discard -> unlock against one datastore.
#[derive(Clone, Copy, Debug, new)]
pub struct Transaction {
    target: Target,
}

// Result of a transaction.
//
// Also attached to errors raised once edits have been submitted.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Serialize)]
pub struct TransactionReport {
    pub target: Target,
    pub outcome: Outcome,
    // Per-edit results, in submission order.
    pub results: Vec<EditResult>,
    // Errors returned by a rejected commit.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub finalize_errors: Vec<RpcError>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    // Every edit is in effect.
    Committed,
    // Nothing is in effect: the candidate datastore was rolled back.
    DiscardedOnFailure,
    // Accepted edits to the running datastore are in effect, rejected ones
    // are not. There is no rollback.
    PartiallyAppliedNoCommit,
}

#[derive(Clone, Debug, Eq, PartialEq, EnumAsInner)]
#[derive(Serialize)]
#[serde(tag = "result", rename_all = "kebab-case")]
pub enum EditResult {
    Accepted,
    Rejected(EditRejection),
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Serialize)]
pub struct EditRejection {
    pub kind: RejectionKind,
    pub errors: Vec<RpcError>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectionKind {
    // The request could not be parsed by the device.
    Malformed,
    // The request was well-formed but its content was refused.
    Invalid,
}

// ===== impl Transaction =====

impl Transaction {
    pub fn target(&self) -> Target {
        self.target
    }

    // Runs the transaction.
    //
    // Every payload is submitted, in order, even after a rejection. The lock
    // taken at the start is released on every path once acquired.
    pub fn run<T: Transport>(
        &self,
        session: &mut Session<T>,
        payloads: &[EditPayload],
    ) -> Result<TransactionReport> {
        let span = debug_span!("transaction", datastore = %self.target);
        let _span_guard = span.enter();

        let mut lock = LockGuard::acquire(session, self.target)?;

        match self.apply(&mut *lock, payloads) {
            Ok(report) => match lock.release() {
                Ok(()) => {
                    Debug::TransactionDone(self.target, report.outcome).log();
                    Ok(report)
                }
                Err(Error::UnlockFailed { error, prior, .. }) => {
                    Err(Error::UnlockFailed {
                        error,
                        prior,
                        report: Some(Box::new(report)),
                    })
                }
                Err(error) => Err(error),
            },
            Err(error) => {
                // Leave no partial change behind in the candidate datastore.
                if self.target.needs_commit()
                    && let Err(discard_error) = lock
                        .execute(Rpc::DiscardChanges, Phase::Finalize)
                        .and_then(|reply| reply.into_result(Phase::Finalize))
                {
                    warn!(error = %discard_error, "failed to discard candidate changes");
                }

                match lock.release() {
                    Ok(()) => Err(error),
                    Err(Error::UnlockFailed { error: unlock, .. }) => {
                        let (prior, report) = match error {
                            Error::Aborted { error, report } => {
                                (error, Some(report))
                            }
                            error => (Box::new(error), None),
                        };
                        Err(Error::UnlockFailed {
                            error: unlock,
                            prior: Some(prior),
                            report,
                        })
                    }
                    Err(unlock) => Err(unlock),
                }
            }
        }
    }

    fn apply<T: Transport>(
        &self,
        session: &mut Session<T>,
        payloads: &[EditPayload],
    ) -> Result<TransactionReport> {
        // Start from a clean candidate datastore.
        if self.target.needs_commit() {
            session.discard_changes()?;
        }

        let mut results = Vec::with_capacity(payloads.len());
        for (index, payload) in payloads.iter().enumerate() {
            // Edits already submitted may be in effect: keep their results.
            let reply = match session.edit_config(self.target, payload) {
                Ok(reply) => reply,
                Err(error) => {
                    let outcome = match self.target {
                        Target::Candidate => Outcome::DiscardedOnFailure,
                        Target::Running => Outcome::PartiallyAppliedNoCommit,
                    };
                    return Err(Error::Aborted {
                        error: Box::new(error),
                        report: Box::new(TransactionReport {
                            target: self.target,
                            outcome,
                            results,
                            finalize_errors: vec![],
                        }),
                    });
                }
            };
            let result = EditResult::from(reply);
            Debug::EditResult(index, &result).log();
            results.push(result);
        }

        let all_accepted = results.iter().all(EditResult::is_accepted);
        let mut finalize_errors = vec![];
        let outcome = match (self.target, all_accepted) {
            (Target::Candidate, true) if payloads.is_empty() => {
                Outcome::Committed
            }
            (Target::Candidate, true) => match session.commit()? {
                RpcReply::Errors(errors) => {
                    warn!(
                        errors = %format_rpc_errors(&errors),
                        "commit rejected"
                    );
                    finalize_errors = errors;
                    session.discard_changes()?;
                    Outcome::DiscardedOnFailure
                }
                _ => Outcome::Committed,
            },
            (Target::Candidate, false) => {
                session.discard_changes()?;
                Outcome::DiscardedOnFailure
            }
            (Target::Running, true) => Outcome::Committed,
            (Target::Running, false) => Outcome::PartiallyAppliedNoCommit,
        };

        Ok(TransactionReport {
            target: self.target,
            outcome,
            results,
            finalize_errors,
        })
    }
}

// ===== impl TransactionReport =====

impl TransactionReport {
    pub fn is_committed(&self) -> bool {
        self.outcome == Outcome::Committed
    }

    // Returns the rejections along with the index of the rejected payload.
    pub fn rejections(&self) -> impl Iterator<Item = (usize, &EditRejection)> {
        self.results
            .iter()
            .enumerate()
            .filter_map(|(index, result)| {
                result.as_rejected().map(|rejection| (index, rejection))
            })
    }

    // Fails with the first edit rejection, if any.
    pub fn check(&self) -> Result<()> {
        match self.rejections().next() {
            Some((_, rejection)) => Err(Error::EditRejected(rejection.clone())),
            None => Ok(()),
        }
    }
}

// ===== impl Outcome =====

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Committed => write!(f, "committed"),
            Outcome::DiscardedOnFailure => write!(f, "discarded on failure"),
            Outcome::PartiallyAppliedNoCommit => {
                write!(f, "partially applied, not committed")
            }
        }
    }
}

// ===== impl EditResult =====

impl From<RpcReply> for EditResult {
    fn from(reply: RpcReply) -> EditResult {
        match reply {
            RpcReply::Errors(errors) => {
                let kind = if errors.iter().any(RpcError::is_malformed) {
                    RejectionKind::Malformed
                } else {
                    RejectionKind::Invalid
                };
                EditResult::Rejected(EditRejection { kind, errors })
            }
            _ => EditResult::Accepted,
        }
    }
}

impl std::fmt::Display for EditResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditResult::Accepted => write!(f, "accepted"),
            EditResult::Rejected(rejection) => {
                write!(f, "rejected: {}", rejection)
            }
        }
    }
}

// ===== impl EditRejection =====

impl std::fmt::Display for EditRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            RejectionKind::Malformed => "malformed request",
            RejectionKind::Invalid => "invalid configuration",
        };
        write!(f, "{} ({})", kind, format_rpc_errors(&self.errors))
    }
}
