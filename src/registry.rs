// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A registry that owns every live [`Context`], the role the teacher's
//! `client::pool_sessions::Pool` plays for iSCSI sessions: one place that
//! creates contexts, starts transactions on them, and ages them off on
//! timeout.
//!
//! A context not currently waiting on I/O or a timeout sits in `idle`.
//! Once a transaction starts, ownership moves into the shared
//! [`TimerList`] (mirroring the original C model where a `pubnub_t`
//! context doubles as its own timer-list node) and `pending` records
//! which slot it lives in, so [`Self::drive`] can pull it back out.

use dashmap::DashMap;
use tracing::debug;

use crate::{
    cfg::config::EngineConfig,
    context::{Context, TransactionKind},
    error::TransactResult,
    fsm::{self, states::State},
    notifier::Notifier,
    pal::Pal,
    timer_list::TimerList,
};

/// Opaque key identifying one context inside the registry.
pub type ContextId = u64;

pub struct ContextRegistry {
    idle: DashMap<ContextId, Context>,
    pending: DashMap<ContextId, usize>,
    timers: TimerList,
    next_id: ContextId,
    default_timeout_ms: i64,
}

impl ContextRegistry {
    pub fn new(default_timeout_ms: i64) -> Self {
        ContextRegistry {
            idle: DashMap::new(),
            pending: DashMap::new(),
            timers: TimerList::new(),
            next_id: 0,
            default_timeout_ms,
        }
    }

    /// Create a context for `origin`, applying keep-alive/proxy config from
    /// [`EngineConfig`], and park it in `idle`.
    pub fn create(&mut self, origin: impl Into<String>, config: &EngineConfig) -> ContextId {
        let mut ctx = Context::new(origin);
        ctx.keep_alive.enabled = config.keep_alive.enabled;
        ctx.keep_alive.max = config.keep_alive.max;
        ctx.keep_alive.timeout = config.keep_alive.timeout();
        if let Some(proxy_cfg) = &config.proxy {
            apply_proxy_config(&mut ctx, proxy_cfg);
        }

        let id = self.next_id;
        self.next_id += 1;
        ctx.registry_id = Some(id);
        self.idle.insert(id, ctx);
        id
    }

    /// Begin a transaction on `id` and drive it until it would-block or
    /// reaches a terminal outcome.
    pub fn start<P: Pal, N: Notifier>(
        &mut self,
        id: ContextId,
        trans: TransactionKind,
        path: impl Into<String>,
        pal: &mut P,
        notifier: &mut N,
    ) -> bool {
        let Some((_, mut ctx)) = self.idle.remove(&id) else {
            return false;
        };
        let started = fsm::start_transaction(&mut ctx, trans, path);
        if !started {
            self.idle.insert(id, ctx);
            return false;
        }
        fsm::step(&mut ctx, pal, notifier);
        self.park(id, ctx);
        true
    }

    /// Drive `id` through one more `step`, e.g. because its socket became
    /// readable/writable. No-op if `id` is idle or unknown.
    pub fn drive<P: Pal, N: Notifier>(&mut self, id: ContextId, pal: &mut P, notifier: &mut N) {
        let Some((_, slot)) = self.pending.remove(&id) else {
            return;
        };
        let Some(mut ctx) = self.timers.remove(slot) else {
            return;
        };
        fsm::step(&mut ctx, pal, notifier);
        self.park(id, ctx);
    }

    /// File `ctx` back into `idle` if it settled, or back into the timer
    /// list (refreshing its deadline) if it is still mid-flight.
    fn park(&mut self, id: ContextId, ctx: Context) {
        if matches!(ctx.state, State::Idle | State::KeepAliveIdle) {
            self.idle.insert(id, ctx);
        } else {
            let slot = self.timers.insert(ctx, self.default_timeout_ms);
            self.pending.insert(id, slot);
        }
    }

    /// Age every pending context by `ms_elapsed`, cancelling those that
    /// exceeded their deadline (§4.2) and driving their teardown to
    /// completion (or back into `pending` if the close itself would block).
    pub fn tick<P: Pal, N: Notifier>(&mut self, ms_elapsed: i64, pal: &mut P, notifier: &mut N) {
        assert!(ms_elapsed > 0, "ms_elapsed must be positive");
        for mut ctx in self.timers.age(ms_elapsed) {
            let id = ctx.registry_id;
            if let Some(id) = id {
                self.pending.remove(&id);
            }
            debug!(origin = %ctx.origin, "transaction timed out");
            fsm::cancel::stop(&mut ctx, notifier, TransactResult::Timeout);
            fsm::step(&mut ctx, pal, notifier);
            if let Some(id) = id {
                self.park(id, ctx);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.idle.len() + self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn apply_proxy_config(ctx: &mut Context, proxy_cfg: &crate::cfg::config::ProxyConfig) {
    use crate::context::ProxyKind;

    match proxy_cfg {
        crate::cfg::config::ProxyConfig::HttpGet { .. } => ctx.proxy.kind = ProxyKind::HttpGet,
        crate::cfg::config::ProxyConfig::HttpConnect { .. } => ctx.proxy.kind = ProxyKind::HttpConnect,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{notifier::ImmediateNotifier, pal::mock::MockPal};

    #[test]
    fn create_parks_context_idle() {
        let config = EngineConfig::default();
        let mut registry = ContextRegistry::new(5000);
        registry.create("example.com", &config);
        assert_eq!(registry.len(), 1);
        assert!(registry.pending.is_empty());
    }

    #[test]
    fn starting_a_transaction_moves_context_out_of_idle() {
        let config = EngineConfig::default();
        let mut registry = ContextRegistry::new(5000);
        let id = registry.create("example.com", &config);

        let mut pal = MockPal::new();
        let mut notifier = ImmediateNotifier::new(|_c: &Context, _r, _s| {});

        registry.start(id, TransactionKind::Get, "/p", &mut pal, &mut notifier);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unknown_id_fails_to_start() {
        let config = EngineConfig::default();
        let mut registry = ContextRegistry::new(5000);
        let mut pal = MockPal::new();
        let mut notifier = ImmediateNotifier::new(|_c: &Context, _r, _s| {});
        assert!(!registry.start(999, TransactionKind::Get, "/p", &mut pal, &mut notifier));
    }
}
