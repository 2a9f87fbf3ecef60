// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Cancellation (§4.4 "Cancellation"): `stop`, and the `WAIT_CANCEL` /
//! `WAIT_CANCEL_CLOSE` teardown states.

use tracing::{debug, warn};

use crate::{
    context::Context,
    error::TransactResult,
    fsm::states::{State, Transition},
    notifier::Notifier,
    pal::Pal,
};

/// §4.4 `stop`.
pub fn stop<N: Notifier>(ctx: &mut Context, notifier: &mut N, outcome: TransactResult) {
    ctx.last_result = Some(outcome);

    match ctx.state {
        State::WaitCancel | State::WaitCancelClose => {
            debug!("stop called while already cancelling; no-op");
        },
        State::Null => {
            warn!("stop called on a NULL-state context");
        },
        State::Idle => {
            ctx.trans = None;
            notifier.trans_outcome(ctx, State::Idle);
        },
        State::KeepAliveIdle => {
            ctx.trans = None;
            ctx.state = State::WaitCancel;
            notifier.requeue_for_processing(ctx);
        },
        _ => {
            ctx.state = State::WaitCancel;
            notifier.requeue_for_processing(ctx);
        },
    }
}

// `can_start_transaction` lives on `Context` directly
// (`Context::can_start_transaction`, §4.4).

pub fn dispatch<P: Pal, N: Notifier>(state: State, ctx: &mut Context, pal: &mut P, notifier: &mut N) -> Transition<()> {
    match state {
        State::WaitCancel => {
            let pending = pal.close(ctx);
            if pending > 0 {
                Transition::Next(State::WaitCancelClose)
            } else {
                deliver_cancel_outcome(ctx, notifier)
            }
        },
        State::WaitCancelClose => {
            if pal.closed(ctx) {
                deliver_cancel_outcome(ctx, notifier)
            } else {
                Transition::Stay
            }
        },
        other => {
            tracing::trace!(state = %other, "cancel::dispatch called for a non-cancel state");
            Transition::Stay
        },
    }
}

fn deliver_cancel_outcome<N: Notifier>(ctx: &mut Context, notifier: &mut N) -> Transition<()> {
    notifier.trans_outcome(ctx, State::Idle);
    Transition::Done(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::ImmediateNotifier;

    #[test]
    fn stop_on_idle_delivers_outcome_immediately() {
        let mut ctx = Context::new("h");
        ctx.state = State::Idle;
        let mut delivered = None;
        let mut notifier = ImmediateNotifier::new(|_c: &Context, r, s| delivered = Some((r, s)));
        stop(&mut ctx, &mut notifier, TransactResult::Cancelled);
        assert_eq!(delivered, Some((TransactResult::Cancelled, State::Idle)));
    }

    #[test]
    fn stop_while_cancelling_is_noop() {
        let mut ctx = Context::new("h");
        ctx.state = State::WaitCancel;
        let mut called = false;
        let mut notifier = ImmediateNotifier::new(|_c: &Context, _r, _s| called = true);
        stop(&mut ctx, &mut notifier, TransactResult::Timeout);
        assert!(!called);
        assert_eq!(ctx.state, State::WaitCancel);
    }

    #[test]
    fn stop_from_mid_transaction_enters_wait_cancel() {
        let mut ctx = Context::new("h");
        ctx.state = State::RxHeaders;
        let mut notifier = ImmediateNotifier::new(|_c: &Context, _r, _s| {});
        stop(&mut ctx, &mut notifier, TransactResult::Timeout);
        assert_eq!(ctx.state, State::WaitCancel);
    }
}
