//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

mod common;

use common::{INVALID, MALFORMED, StubDevice, hostname, interface};
use ncpush_client::capabilities;
use ncpush_client::{
    EditResult, Error, LockGuard, Outcome, Phase, RejectionKind, Target,
    Transaction,
};

#[test]
fn test_candidate_all_accepted() {
    let device =
        StubDevice::new(&[capabilities::BASE_1_0, capabilities::CANDIDATE]);
    let mut session = device.session();
    let target = session.capabilities().unwrap().select_target().unwrap();
    assert_eq!(target, Target::Candidate);

    let payloads = [hostname("r1"), interface("1/0/1", "uplink")];
    let report =
        Transaction::new(target).run(&mut session, &payloads).unwrap();

    assert_eq!(report.target, Target::Candidate);
    assert_eq!(report.outcome, Outcome::Committed);
    assert_eq!(
        report.results,
        vec![EditResult::Accepted, EditResult::Accepted]
    );
    assert!(report.finalize_errors.is_empty());
    assert!(report.check().is_ok());

    assert_eq!(
        device.rpcs(),
        vec![
            "lock",
            "discard-changes",
            "edit-config",
            "edit-config",
            "commit",
            "unlock"
        ]
    );
    let state = device.state();
    assert_eq!(state.lock_count, 1);
    assert_eq!(state.unlock_count, 1);
    assert_eq!(state.running.len(), 2);
    assert!(state.candidate.is_empty());
}

#[test]
fn test_candidate_rejected_edit() {
    let device =
        StubDevice::new(&[capabilities::BASE_1_0, capabilities::CANDIDATE]);
    let mut session = device.session();

    let payloads = [hostname("r1"), hostname(INVALID), hostname("r3")];
    let report = Transaction::new(Target::Candidate)
        .run(&mut session, &payloads)
        .unwrap();

    assert_eq!(report.outcome, Outcome::DiscardedOnFailure);
    assert_eq!(report.results.len(), 3);
    assert!(report.results[0].is_accepted());
    let rejection = report.results[1].as_rejected().unwrap();
    assert_eq!(rejection.kind, RejectionKind::Invalid);
    assert_eq!(rejection.errors[0].tag, "invalid-value");
    assert_eq!(rejection.errors[0].message.as_deref(), Some("bad value"));
    // Edits after a rejection are still submitted.
    assert!(report.results[2].is_accepted());
    assert!(matches!(report.check(), Err(Error::EditRejected(_))));
    let rejected = report.rejections().map(|(index, _)| index);
    assert_eq!(rejected.collect::<Vec<_>>(), vec![1]);

    let rpcs = device.rpcs();
    assert!(!rpcs.iter().any(|rpc| rpc == "commit"));
    assert_eq!(rpcs.iter().filter(|rpc| *rpc == "edit-config").count(), 3);
    assert_eq!(rpcs.last().map(String::as_str), Some("unlock"));
    let state = device.state();
    assert_eq!(state.unlock_count, 1);
    assert!(state.running.is_empty());
    assert!(state.candidate.is_empty());
}

#[test]
fn test_candidate_malformed_edit() {
    let device = StubDevice::candidate();
    let mut session = device.session();

    let payloads = [hostname(MALFORMED)];
    let report = Transaction::new(Target::Candidate)
        .run(&mut session, &payloads)
        .unwrap();

    assert_eq!(report.outcome, Outcome::DiscardedOnFailure);
    let rejection = report.results[0].as_rejected().unwrap();
    assert_eq!(rejection.kind, RejectionKind::Malformed);
}

#[test]
fn test_candidate_commit_rejected() {
    let device = StubDevice::candidate();
    device.state().reject_commit = true;
    let mut session = device.session();

    let payloads = [hostname("r1")];
    let report = Transaction::new(Target::Candidate)
        .run(&mut session, &payloads)
        .unwrap();

    assert_eq!(report.outcome, Outcome::DiscardedOnFailure);
    assert_eq!(report.results, vec![EditResult::Accepted]);
    assert_eq!(report.finalize_errors.len(), 1);
    assert_eq!(report.finalize_errors[0].tag, "operation-failed");
    assert_eq!(
        device.rpcs(),
        vec![
            "lock",
            "discard-changes",
            "edit-config",
            "commit",
            "discard-changes",
            "unlock"
        ]
    );
    assert!(device.state().running.is_empty());
}

#[test]
fn test_running_accepted() {
    let device = StubDevice::running();
    let mut session = device.session();
    let target = session.capabilities().unwrap().select_target().unwrap();
    assert_eq!(target, Target::Running);

    let payloads = [hostname("r1")];
    let report =
        Transaction::new(target).run(&mut session, &payloads).unwrap();

    assert_eq!(report.outcome, Outcome::Committed);
    assert_eq!(report.results, vec![EditResult::Accepted]);
    // Edits to the running datastore take effect immediately.
    assert_eq!(device.rpcs(), vec!["lock", "edit-config", "unlock"]);
    assert_eq!(device.state().running.len(), 1);
}

#[test]
fn test_running_partially_applied() {
    let device = StubDevice::running();
    let mut session = device.session();

    let payloads = [hostname("r1"), hostname(INVALID)];
    let report = Transaction::new(Target::Running)
        .run(&mut session, &payloads)
        .unwrap();

    assert_eq!(report.outcome, Outcome::PartiallyAppliedNoCommit);
    assert!(report.results[0].is_accepted());
    assert!(report.results[1].as_rejected().is_some());
    let rpcs = device.rpcs();
    assert!(
        !rpcs
            .iter()
            .any(|rpc| rpc == "commit" || rpc == "discard-changes")
    );
    let state = device.state();
    assert_eq!(state.running.len(), 1);
    assert_eq!(state.unlock_count, 1);
}

#[test]
fn test_empty_payload_list() {
    for (device, target) in [
        (StubDevice::candidate(), Target::Candidate),
        (StubDevice::running(), Target::Running),
    ] {
        let mut session = device.session();
        let report =
            Transaction::new(target).run(&mut session, &[]).unwrap();

        assert_eq!(report.outcome, Outcome::Committed);
        assert!(report.results.is_empty());
        let rpcs = device.rpcs();
        assert!(!rpcs.iter().any(|rpc| rpc == "commit"));
        let state = device.state();
        assert_eq!(state.lock_count, 1);
        assert_eq!(state.unlock_count, 1);
    }
}

#[test]
fn test_lock_contention() {
    let device = StubDevice::candidate();
    device.state().deny_lock = 1;
    let mut session = device.session();

    let payloads = [hostname("r1")];
    let error = Transaction::new(Target::Candidate)
        .run(&mut session, &payloads)
        .unwrap_err();

    assert!(matches!(error, Error::LockContention(Target::Candidate, _)));
    assert!(error.is_retryable());
    assert_eq!(error.phase(), Some(Phase::Lock));
    // Nothing was locked: no edit, no unlock.
    assert_eq!(device.rpcs(), vec!["lock"]);
    let state = device.state();
    assert_eq!(state.edit_count, 0);
    assert_eq!(state.unlock_count, 0);
}

#[test]
fn test_timeout_during_edit() {
    let device = StubDevice::candidate();
    device.state().timeout_on_edit = Some(1);
    let mut session = device.session();

    let payloads = [hostname("r1"), hostname("r2"), hostname("r3")];
    let error = Transaction::new(Target::Candidate)
        .run(&mut session, &payloads)
        .unwrap_err();

    assert_eq!(error.phase(), Some(Phase::Edit));
    assert!(!error.is_retryable());
    assert_eq!(
        error.to_string(),
        "transaction aborted (discarded on failure): edit request timed out"
    );
    let Error::Aborted { error, report } = error else {
        panic!("unexpected error: {}", error);
    };
    assert!(matches!(*error, Error::TransportTimeout(Phase::Edit)));
    assert_eq!(report.target, Target::Candidate);
    assert_eq!(report.outcome, Outcome::DiscardedOnFailure);
    assert_eq!(report.results, vec![EditResult::Accepted]);

    assert_eq!(
        device.rpcs(),
        vec![
            "lock",
            "discard-changes",
            "edit-config",
            "edit-config",
            "discard-changes",
            "unlock"
        ]
    );
    let state = device.state();
    assert_eq!(state.unlock_count, 1);
    assert!(state.locked.is_none());
    assert!(state.running.is_empty());
}

#[test]
fn test_running_timeout_keeps_results() {
    let device = StubDevice::running();
    device.state().timeout_on_edit = Some(2);
    let mut session = device.session();

    let payloads = [hostname("r1"), hostname(INVALID), hostname("r3")];
    let error = Transaction::new(Target::Running)
        .run(&mut session, &payloads)
        .unwrap_err();

    let report = error.report().unwrap();
    assert_eq!(report.outcome, Outcome::PartiallyAppliedNoCommit);
    assert_eq!(report.results.len(), 2);
    assert!(report.results[0].is_accepted());
    assert!(report.results[1].is_rejected());
    assert!(matches!(
        error,
        Error::Aborted { ref error, .. }
            if matches!(**error, Error::TransportTimeout(Phase::Edit))
    ));

    // The first edit is live on the device.
    assert_eq!(
        device.rpcs(),
        vec![
            "lock",
            "edit-config",
            "edit-config",
            "edit-config",
            "unlock"
        ]
    );
    let state = device.state();
    assert_eq!(state.running.len(), 1);
    assert!(state.locked.is_none());
}

#[test]
fn test_unlock_failure() {
    let device = StubDevice::candidate();
    device.state().fail_unlock = true;
    let mut session = device.session();

    let payloads = [hostname("r1")];
    let error = Transaction::new(Target::Candidate)
        .run(&mut session, &payloads)
        .unwrap_err();

    let Error::UnlockFailed {
        error,
        prior,
        report,
    } = error
    else {
        panic!("unexpected error: {}", error);
    };
    assert!(matches!(*error, Error::RpcFailed(Phase::Unlock, _)));
    assert!(prior.is_none());
    // The commit happened before the unlock failed.
    assert_eq!(report.unwrap().outcome, Outcome::Committed);
    assert_eq!(device.state().unlock_count, 1);
}

#[test]
fn test_unlock_failure_after_timeout() {
    let device = StubDevice::running();
    {
        let mut state = device.state();
        state.fail_unlock = true;
        state.timeout_on_edit = Some(0);
    }
    let mut session = device.session();

    let payloads = [hostname("r1")];
    let error = Transaction::new(Target::Running)
        .run(&mut session, &payloads)
        .unwrap_err();

    assert_eq!(error.phase(), Some(Phase::Unlock));
    let Error::UnlockFailed { prior, report, .. } = error else {
        panic!("unexpected error: {}", error);
    };
    assert!(matches!(
        prior.as_deref(),
        Some(Error::TransportTimeout(Phase::Edit))
    ));
    let report = report.unwrap();
    assert_eq!(report.outcome, Outcome::PartiallyAppliedNoCommit);
    assert!(report.results.is_empty());
    assert_eq!(device.state().unlock_count, 1);
}

#[test]
fn test_late_edit_reply_unlock_failure() {
    let device = StubDevice::candidate();
    {
        let mut state = device.state();
        state.fail_unlock = true;
        state.delay_edit = Some(0);
    }
    let mut session = device.session();

    let payloads = [hostname("r1")];
    let error = Transaction::new(Target::Candidate)
        .run(&mut session, &payloads)
        .unwrap_err();

    // The late edit reply is not mistaken for the discard or unlock reply.
    let Error::UnlockFailed {
        error,
        prior,
        report,
    } = error
    else {
        panic!("unexpected error: {}", error);
    };
    assert!(matches!(*error, Error::RpcFailed(Phase::Unlock, _)));
    assert!(matches!(
        prior.as_deref(),
        Some(Error::TransportTimeout(Phase::Edit))
    ));
    assert_eq!(report.unwrap().outcome, Outcome::DiscardedOnFailure);
    assert_eq!(
        device.rpcs(),
        vec![
            "lock",
            "discard-changes",
            "edit-config",
            "discard-changes",
            "unlock"
        ]
    );
    assert!(device.state().candidate.is_empty());
}

#[test]
fn test_timeout_on_initial_discard() {
    let device = StubDevice::candidate();
    device.state().timeout_on_rpc = Some("discard-changes".to_owned());
    let mut session = device.session();

    let payloads = [hostname("r1")];
    let error = Transaction::new(Target::Candidate)
        .run(&mut session, &payloads)
        .unwrap_err();

    assert!(matches!(error, Error::TransportTimeout(Phase::Finalize)));
    assert_eq!(error.to_string(), "finalize request timed out");
    assert!(error.report().is_none());
    assert_eq!(
        device.rpcs(),
        vec!["lock", "discard-changes", "discard-changes", "unlock"]
    );
    assert_eq!(device.state().edit_count, 0);
}

#[test]
fn test_lock_guard() {
    let device = StubDevice::candidate();
    let mut session = device.session();

    let lock = LockGuard::acquire(&mut session, Target::Candidate).unwrap();
    assert_eq!(lock.target(), Target::Candidate);
    lock.release().unwrap();

    // Dropping an unreleased guard still unlocks the datastore.
    {
        let _lock =
            LockGuard::acquire(&mut session, Target::Running).unwrap();
    }
    let state = device.state();
    assert_eq!(state.lock_count, 2);
    assert_eq!(state.unlock_count, 2);
    assert!(state.locked.is_none());
}

#[test]
fn test_lock_guard_reentrance() {
    let device = StubDevice::candidate();
    let mut session = device.session();

    let mut lock =
        LockGuard::acquire(&mut session, Target::Candidate).unwrap();
    let error = Transaction::new(Target::Candidate)
        .run(&mut *lock, &[hostname("r1")])
        .unwrap_err();
    assert!(matches!(error, Error::AlreadyLocked(Target::Candidate)));
    lock.release().unwrap();

    let state = device.state();
    assert_eq!(state.lock_count, 1);
    assert_eq!(state.edit_count, 0);
}

#[test]
fn test_report_serialization() {
    let device = StubDevice::candidate();
    let mut session = device.session();

    let payloads = [hostname(INVALID)];
    let report = Transaction::new(Target::Candidate)
        .run(&mut session, &payloads)
        .unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["target"], "candidate");
    assert_eq!(json["outcome"], "discarded-on-failure");
    assert_eq!(json["results"][0]["result"], "rejected");
    assert_eq!(json["results"][0]["kind"], "invalid");
    assert_eq!(json["results"][0]["errors"][0]["tag"], "invalid-value");
    assert!(json.get("finalize_errors").is_none());
}
