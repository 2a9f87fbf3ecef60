// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Notifier capability set (§6): how the FSM hands a context back to the
//! scheduler for re-processing, and how it publishes a terminal outcome.

use tracing::trace;

use crate::{context::Context, error::TransactResult, fsm::states::State};

/// Requeue outcome (§6 `enqueue_for_processing`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueStatus {
    InternalError,
    Immediate,
    Waiting,
}

/// How a transaction's result is published to the user of the engine, and
/// how re-processing is scheduled.
pub trait Notifier {
    fn enqueue_for_processing(&mut self, ctx: &mut Context) -> EnqueueStatus;
    fn requeue_for_processing(&mut self, ctx: &mut Context);
    /// Publishes `ctx.last_result` to user code. `terminal_state` is always
    /// `State::Idle` or `State::KeepAliveIdle`.
    fn trans_outcome(&mut self, ctx: &mut Context, terminal_state: State);
}

/// A [`Notifier`] for single-threaded, synchronous drivers: re-processing
/// is always reported as immediate, and outcomes are delivered through a
/// plain callback.
pub struct ImmediateNotifier<F>
where F: FnMut(&Context, TransactResult, State)
{
    on_outcome: F,
}

impl<F> ImmediateNotifier<F>
where F: FnMut(&Context, TransactResult, State)
{
    pub fn new(on_outcome: F) -> Self {
        ImmediateNotifier { on_outcome }
    }
}

impl<F> Notifier for ImmediateNotifier<F>
where F: FnMut(&Context, TransactResult, State)
{
    fn enqueue_for_processing(&mut self, _ctx: &mut Context) -> EnqueueStatus {
        EnqueueStatus::Immediate
    }

    fn requeue_for_processing(&mut self, _ctx: &mut Context) {
        trace!("requeue_for_processing: immediate driver re-steps synchronously");
    }

    fn trans_outcome(&mut self, ctx: &mut Context, terminal_state: State) {
        debug_assert!(matches!(terminal_state, State::Idle | State::KeepAliveIdle));
        let result = ctx.last_result.unwrap_or(TransactResult::InternalError);
        ctx.state = terminal_state;
        (self.on_outcome)(ctx, result, terminal_state);
    }
}
