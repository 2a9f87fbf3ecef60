// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! An in-memory [`Pal`] double driven by canned byte streams, the
//! analogue of the teacher's hex-fixture-backed unit tests: instead of
//! replaying iSCSI PDU fixtures, it replays HTTP byte streams and records
//! what the FSM sent.

use std::collections::VecDeque;

use crate::{
    constants::BUF_MAX,
    context::Context,
    pal::{ConnectStatus, IoStatus, LineReadStatus, Pal, ReadStatus, WatchDirection},
};

#[derive(Default)]
struct MockConn {
    /// Bytes the FSM has written, in order, for assertions.
    sent: Vec<u8>,
    /// Bytes still to hand back to `line_read_status` / `read_status`,
    /// queued one exchange at a time via [`MockPal::queue_reply`].
    inbound: VecDeque<u8>,
    line_buf: Vec<u8>,
    connect_fails: bool,
    closed: bool,
    /// Bytes requested by the most recent [`Pal::start_read`]; `read_status`
    /// hands back at most this many bytes per call.
    read_target: usize,
}

/// An in-memory double for [`Pal`]. Connect always succeeds (unless
/// [`MockPal::fail_next_connect`] was called), writes are recorded, and
/// reads are served from a queue filled with [`MockPal::queue_reply`].
#[derive(Default)]
pub struct MockPal {
    conns: Vec<MockConn>,
}

impl MockPal {
    pub fn new() -> Self {
        MockPal::default()
    }

    fn slot(&mut self, ctx: &mut Context) -> usize {
        if let Some(slot) = ctx.pal_slot {
            return slot;
        }
        self.conns.push(MockConn::default());
        let slot = self.conns.len() - 1;
        ctx.pal_slot = Some(slot);
        slot
    }

    /// Append bytes the peer "sends back" on this context's connection.
    pub fn queue_reply(&mut self, ctx: &mut Context, bytes: &[u8]) {
        let slot = self.slot(ctx);
        self.conns[slot].inbound.extend(bytes.iter().copied());
    }

    /// Everything the FSM has written to this context's connection so far.
    pub fn sent(&self, ctx: &Context) -> &[u8] {
        match ctx.pal_slot {
            Some(slot) => &self.conns[slot].sent,
            None => &[],
        }
    }

    /// Force the next `resolv_and_connect` on this context to fail.
    pub fn fail_next_connect(&mut self, ctx: &mut Context) {
        let slot = self.slot(ctx);
        self.conns[slot].connect_fails = true;
    }
}

impl Pal for MockPal {
    fn resolv_and_connect(&mut self, ctx: &mut Context) -> ConnectStatus {
        let slot = self.slot(ctx);
        if self.conns[slot].connect_fails {
            return ConnectStatus::Failed;
        }
        ConnectStatus::ConnectSuccess
    }

    fn check_resolv_and_connect(&mut self, ctx: &mut Context) -> ConnectStatus {
        self.check_connect(ctx)
    }

    fn check_connect(&mut self, _ctx: &mut Context) -> ConnectStatus {
        ConnectStatus::ConnectSuccess
    }

    fn got_socket(&mut self, _ctx: &mut Context) -> i32 {
        0
    }

    fn update_socket(&mut self, _ctx: &mut Context) {}

    fn forget(&mut self, _ctx: &mut Context) {}

    fn lost_socket(&mut self, _ctx: &mut Context) {}

    fn watch_events(&mut self, _ctx: &mut Context, _direction: WatchDirection) {}

    fn send_literal_str(&mut self, ctx: &mut Context, s: &'static str) -> IoStatus {
        self.send_str(ctx, s)
    }

    fn send_str(&mut self, ctx: &mut Context, s: &str) -> IoStatus {
        let slot = self.slot(ctx);
        self.conns[slot].sent.extend_from_slice(s.as_bytes());
        IoStatus::Done
    }

    fn send_status(&mut self, _ctx: &mut Context) -> IoStatus {
        IoStatus::Done
    }

    fn start_read_line(&mut self, ctx: &mut Context) {
        let slot = self.slot(ctx);
        self.conns[slot].line_buf.clear();
    }

    fn line_read_status(&mut self, ctx: &mut Context) -> LineReadStatus {
        let slot = self.slot(ctx);
        let conn = &mut self.conns[slot];
        loop {
            if conn.line_buf.ends_with(b"\r\n") {
                ctx.http_buf = std::mem::take(&mut conn.line_buf);
                return LineReadStatus::Ok;
            }
            if conn.line_buf.len() >= BUF_MAX {
                ctx.http_buf = std::mem::take(&mut conn.line_buf);
                return LineReadStatus::TxBuffTooSmall;
            }
            match conn.inbound.pop_front() {
                Some(b) => conn.line_buf.push(b),
                None => return LineReadStatus::InProgress,
            }
        }
    }

    fn start_read(&mut self, ctx: &mut Context, n: usize) {
        let slot = self.slot(ctx);
        self.conns[slot].read_target = n;
    }

    fn read_status(&mut self, ctx: &mut Context) -> ReadStatus {
        let slot = self.slot(ctx);
        let conn = &mut self.conns[slot];
        if conn.inbound.is_empty() {
            return ReadStatus::InProgress;
        }
        let take = conn.read_target.min(conn.inbound.len());
        let chunk: Vec<u8> = conn.inbound.drain(..take).collect();
        ctx.http_reply.extend_from_slice(&chunk);
        ctx.http_buf_len += chunk.len();
        ReadStatus::Ok
    }

    fn read_len(&mut self, ctx: &Context) -> usize {
        ctx.http_buf_len
    }

    fn close(&mut self, ctx: &mut Context) -> i32 {
        let slot = self.slot(ctx);
        self.conns[slot].closed = true;
        0
    }

    fn closed(&mut self, ctx: &Context) -> bool {
        match ctx.pal_slot {
            Some(slot) => self.conns[slot].closed,
            None => true,
        }
    }
}
