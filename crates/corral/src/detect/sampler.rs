// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session sampler: ticks the classifier at a fixed cadence and applies
//! dwell hysteresis so prompt flickers during redraws don't churn the state.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::session::{PendingTransition, Session, SessionState, StateRecord};
use crate::supervisor::Supervisor;

use super::{Candidate, MAX_DETECT_ROWS};

/// Outcome of a single dwell evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DwellOutcome {
    /// Nothing to commit this tick.
    Hold,
    /// The candidate held for the full dwell window.
    Commit(SessionState),
}

/// Apply the dwell rule to one classifier sample.
///
/// A candidate equal to the committed state clears any pending transition;
/// a differing candidate starts (or restarts) the dwell clock, and commits
/// only once it has held for `dwell`.
pub(crate) fn dwell_step(
    rec: &mut StateRecord,
    candidate: Candidate,
    now: Instant,
    dwell: Duration,
) -> DwellOutcome {
    let target = candidate.state();
    if target == rec.state {
        rec.pending = None;
        return DwellOutcome::Hold;
    }

    match rec.pending {
        Some(pending) if pending.candidate == candidate => {
            if now.duration_since(pending.since) >= dwell {
                DwellOutcome::Commit(target)
            } else {
                DwellOutcome::Hold
            }
        }
        _ => {
            rec.pending = Some(PendingTransition {
                candidate,
                since: now,
            });
            DwellOutcome::Hold
        }
    }
}

/// Spawn the sampler task for a session.
pub(crate) fn spawn_sampler(sup: Arc<Supervisor>, session: Arc<Session>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sup.sample_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = session.cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            let rows = {
                let term = session.terminal.read().await;
                term.screen.tail(MAX_DETECT_ROWS)
            };
            let candidate = session.strategy.classify(&rows);

            let mut rec = session.state.lock().await;

            // The auto-approver owns the transition out of this state; keep
            // sampling for observation but commit nothing.
            if rec.state == SessionState::PendingAutoApproval {
                continue;
            }

            if let DwellOutcome::Commit(next) =
                dwell_step(&mut rec, candidate, Instant::now(), sup.dwell())
            {
                debug!(session = %session.id, from = %rec.state, to = %next, "state commit");
                let entered_clean_wait =
                    next == SessionState::WaitingInput && !rec.auto_approval_failed;
                session.commit_state(&mut rec, next, &sup.events, &sup.hooks);

                if entered_clean_wait {
                    sup.approval.on_waiting_input(&sup, &session, &mut rec, &rows);
                }
            }
        }
    })
}

#[cfg(test)]
#[path = "sampler_tests.rs"]
mod tests;
