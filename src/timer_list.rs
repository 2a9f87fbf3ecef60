// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Timer list (§4.1) and the expiry handler (§4.2).
//!
//! The original C implementation links `pubnub_t` nodes into each other
//! directly (`prev`/`next` pointers embedded in the context struct,
//! `original_source/core/pbpal_ntf_callback_handle_timer_list.c`). Per the
//! Design Notes that is replaced here with an arena of slots addressed by
//! index (`Context::timer_slot`), so there are no raw cyclic references.

use crate::{context::Context, error::TransactResult};

struct Node {
    ctx: Context,
    /// Milliseconds remaining *after* the previous node's deadline, i.e. a
    /// delta, except for the head node where it is the absolute remainder.
    delta_ms: i64,
    next: Option<usize>,
}

/// Ordered-by-deadline list of pending contexts, stored as an arena so that
/// insert/remove/age are index operations rather than pointer surgery.
#[derive(Default)]
pub struct TimerList {
    slots: Vec<Option<Node>>,
    head: Option<usize>,
    free: Vec<usize>,
}

impl TimerList {
    pub fn new() -> Self {
        TimerList::default()
    }

    fn alloc(&mut self, node: Node) -> usize {
        if let Some(slot) = self.free.pop() {
            self.slots[slot] = Some(node);
            slot
        } else {
            self.slots.push(Some(node));
            self.slots.len() - 1
        }
    }

    /// Insert `ctx` so that the prefix-sum of deltas from the head to its
    /// slot equals `ms` (§4.1 `insert`).
    pub fn insert(&mut self, mut ctx: Context, ms: i64) -> usize {
        let mut remaining = ms;
        let mut prev: Option<usize> = None;
        let mut cur = self.head;

        while let Some(idx) = cur {
            let node_delta = self.slots[idx].as_ref().expect("linked slot must be occupied").delta_ms;
            if remaining < node_delta {
                break;
            }
            remaining -= node_delta;
            prev = Some(idx);
            cur = self.slots[idx].as_ref().expect("linked slot must be occupied").next;
        }

        if let Some(next_idx) = cur {
            let next_node = self.slots[next_idx].as_mut().expect("linked slot must be occupied");
            next_node.delta_ms -= remaining;
        }

        ctx.timer_slot = None;
        let new_idx = self.alloc(Node { ctx, delta_ms: remaining, next: cur });
        self.slots[new_idx]
            .as_mut()
            .expect("just allocated")
            .ctx
            .timer_slot = Some(new_idx);

        match prev {
            Some(p) => self.slots[p].as_mut().expect("linked slot must be occupied").next = Some(new_idx),
            None => self.head = Some(new_idx),
        }
        new_idx
    }

    /// Remove the context at `slot`, folding its delta into its successor
    /// (§4.1 `remove`), and return the detached [`Context`].
    pub fn remove(&mut self, slot: usize) -> Option<Context> {
        let mut prev: Option<usize> = None;
        let mut cur = self.head;
        while let Some(idx) = cur {
            if idx == slot {
                break;
            }
            prev = Some(idx);
            cur = self.slots[idx].as_ref().expect("linked slot must be occupied").next;
        }
        if cur != Some(slot) {
            return None;
        }

        let node = self.slots[slot].take()?;
        self.free.push(slot);

        if let Some(next_idx) = node.next {
            self.slots[next_idx].as_mut().expect("linked slot must be occupied").delta_ms += node.delta_ms;
        }

        match prev {
            Some(p) => self.slots[p].as_mut().expect("linked slot must be occupied").next = node.next,
            None => self.head = node.next,
        }

        let mut ctx = node.ctx;
        ctx.timer_slot = None;
        Some(ctx)
    }

    /// §4.1 `remove_safe` / §9 `pbpal_remove_timer_safe`: idempotent — a
    /// no-op if the context is not currently linked.
    pub fn remove_safe(&mut self, ctx: &mut Context) -> Option<Context> {
        let slot = ctx.timer_slot?;
        self.remove(slot)
    }

    /// Subtract `delta_ms` from the head's deadline, detaching every node
    /// whose effective deadline has reached zero or below (§4.1 `age`).
    /// Returns the expired contexts in deadline order.
    pub fn age(&mut self, delta_ms: i64) -> Vec<Context> {
        let mut remaining = delta_ms;
        let mut expired = Vec::new();

        while let Some(idx) = self.head {
            let node_delta = self.slots[idx].as_ref().expect("linked slot must be occupied").delta_ms;
            if node_delta > remaining {
                self.slots[idx].as_mut().expect("linked slot must be occupied").delta_ms = node_delta - remaining;
                break;
            }
            remaining -= node_delta;
            let node = self.slots[idx].take().expect("head slot must be occupied");
            self.free.push(idx);
            self.head = node.next;
            let mut ctx = node.ctx;
            ctx.timer_slot = None;
            expired.push(ctx);
        }

        expired
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }
}

/// §4.2 `handle_timer_list`: age the list by `ms_elapsed` and call `stop`
/// (via `on_expired`) on everything that fell off, in order.
///
/// `ms_elapsed` must be strictly positive, matching the
/// `PUBNUB_ASSERT_OPT(ms_elapsed > 0)` guard in the original.
pub fn handle_timer_list<F>(list: &mut TimerList, ms_elapsed: i64, mut on_expired: F)
where F: FnMut(Context, TransactResult)
{
    assert!(ms_elapsed > 0, "ms_elapsed must be positive");
    for ctx in list.age(ms_elapsed) {
        on_expired(ctx, TransactResult::Timeout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(name: &str) -> Context {
        Context::new(name)
    }

    #[test]
    fn insert_then_remove_leaves_totals_unchanged() {
        let mut list = TimerList::new();
        let a = list.insert(ctx("a"), 1000);
        let b = list.insert(ctx("b"), 500);
        let removed = list.remove(b).expect("b must be present");
        assert_eq!(removed.origin, "b");
        let expired = list.age(1000);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].origin, "a");
        let _ = a;
    }

    #[test]
    fn age_is_additive() {
        let mut list_a = TimerList::new();
        list_a.insert(ctx("x"), 1500);
        let expired_a = list_a.age(700);
        assert!(expired_a.is_empty());
        let expired_a = list_a.age(800);
        assert_eq!(expired_a.len(), 1);

        let mut list_b = TimerList::new();
        list_b.insert(ctx("x"), 1500);
        let expired_b = list_b.age(1500);
        assert_eq!(expired_b.len(), 1);
    }

    #[test]
    fn ordering_preserved_by_insert() {
        let mut list = TimerList::new();
        list.insert(ctx("slow"), 2000);
        list.insert(ctx("fast"), 100);
        list.insert(ctx("mid"), 1000);

        let expired = list.age(2500);
        let names: Vec<_> = expired.iter().map(|c| c.origin.clone()).collect();
        assert_eq!(names, vec!["fast", "mid", "slow"]);
    }

    #[test]
    fn remove_safe_is_idempotent() {
        let mut list = TimerList::new();
        let mut standalone = ctx("solo");
        assert!(list.remove_safe(&mut standalone).is_none());

        list.insert(ctx("solo"), 1000);
        let expired = list.age(1000);
        let mut gone = expired.into_iter().next().expect("one expired");
        assert!(list.remove_safe(&mut gone).is_none());
    }

    #[test]
    fn handle_timer_list_invokes_stop_in_order() {
        let mut list = TimerList::new();
        list.insert(ctx("a"), 100);
        list.insert(ctx("b"), 200);

        let mut stopped = Vec::new();
        handle_timer_list(&mut list, 150, |ctx, result| {
            stopped.push((ctx.origin.clone(), result));
        });

        assert_eq!(stopped.len(), 1);
        assert_eq!(stopped[0].0, "a");
        assert_eq!(stopped[0].1, TransactResult::Timeout);
    }

    #[test]
    #[should_panic]
    fn handle_timer_list_rejects_non_positive_elapsed() {
        let mut list = TimerList::new();
        handle_timer_list(&mut list, 0, |_, _| {});
    }
}
