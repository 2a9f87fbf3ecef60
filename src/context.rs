// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The `Context` data model (§3): one concurrently-pending HTTP exchange
//! and all the state the FSM needs to drive it.

use std::time::{Duration, Instant};

use bytes::BytesMut;

use crate::{
    constants::BUF_MAX,
    error::TransactResult,
    fsm::states::State,
};

/// Selects which entry of the parser dispatch table (§4.3) finalizes the
/// response body for a transaction.
#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    Get = 0,
    Head = 1,
    Post = 2,
}

/// Number of [`TransactionKind`] variants; the parser table is sized
/// exactly to this (§4.3).
pub const TRANSACTION_KIND_COUNT: usize = 3;

/// Content-Encoding seen on the response, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentEncoding {
    #[default]
    None,
    Gzip,
}

/// HTTP proxy mode (§4.4 Request emission).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProxyKind {
    #[default]
    None,
    HttpGet,
    HttpConnect,
}

/// Proxy-related mutable state carried on the context.
#[derive(Debug, Clone, Default)]
pub struct ProxyState {
    pub kind: ProxyKind,
    pub tunnel_established: bool,
    pub saved_path: Vec<u8>,
    pub retry_after_close: bool,
}

/// Keep-alive connection-reuse accounting (§3 `keep_alive`).
#[derive(Debug, Clone)]
pub struct KeepAlive {
    pub enabled: bool,
    pub count: u32,
    pub max: u32,
    pub t_connect: Option<Instant>,
    pub timeout: Duration,
    pub should_close: bool,
}

impl Default for KeepAlive {
    fn default() -> Self {
        KeepAlive {
            enabled: true,
            count: 0,
            max: 1000,
            t_connect: None,
            timeout: Duration::from_secs(300),
            should_close: false,
        }
    }
}

impl KeepAlive {
    /// Reset the per-connection counters. Called exactly once per physical
    /// connect, from `CONNECTED`, not per logical transaction (§10.6).
    pub fn on_connected(&mut self) {
        self.count = 0;
        self.t_connect = Some(Instant::now());
        self.should_close = false;
    }
}

/// Index of a context's slot in the [`crate::timer_list::TimerList`] arena,
/// if it is currently linked (§9 Design Notes: arena + indices, not raw
/// cyclic references).
pub type TimerSlot = usize;

/// One concurrently-pending HTTP exchange (§3).
pub struct Context {
    pub state: State,
    pub trans: Option<TransactionKind>,
    pub last_result: Option<TransactResult>,
    pub http_code: u16,
    pub http_buf: Vec<u8>,
    pub http_buf_len: usize,
    pub http_reply: BytesMut,
    pub http_content_len: usize,
    pub http_chunked: bool,
    pub data_compressed: ContentEncoding,
    pub keep_alive: KeepAlive,
    pub proxy: ProxyState,
    pub origin: String,
    pub path: String,
    /// Slot in the owning [`crate::timer_list::TimerList`], `None` if not
    /// currently linked.
    pub timer_slot: Option<TimerSlot>,
    /// Opaque handle a [`crate::pal::Pal`] implementation uses to locate its
    /// own per-connection state (socket, read buffers). The FSM never
    /// interprets this value; it only ever passes it back to the PAL.
    pub pal_slot: Option<usize>,
    /// Opaque handle a [`crate::registry::ContextRegistry`] uses to find its
    /// own bookkeeping for this context after pulling it back out of the
    /// timer list. Same contract as `pal_slot`: the FSM never reads it.
    pub registry_id: Option<u64>,
}

impl Context {
    pub fn new(origin: impl Into<String>) -> Self {
        Context {
            state: State::Idle,
            trans: None,
            last_result: None,
            http_code: 0,
            http_buf: Vec::with_capacity(BUF_MAX),
            http_buf_len: 0,
            http_reply: BytesMut::new(),
            http_content_len: 0,
            http_chunked: false,
            data_compressed: ContentEncoding::None,
            keep_alive: KeepAlive::default(),
            proxy: ProxyState::default(),
            origin: origin.into(),
            path: String::new(),
            timer_slot: None,
            pal_slot: None,
            registry_id: None,
        }
    }

    /// §4.4 `can_start_transaction`: true exactly in `{Idle, KeepAliveIdle}`.
    pub fn can_start_transaction(&self) -> bool {
        matches!(self.state, State::Idle | State::KeepAliveIdle)
    }

    pub fn reset_for_transaction(&mut self, trans: TransactionKind, path: impl Into<String>) {
        self.trans = Some(trans);
        self.path = path.into();
        self.http_code = 0;
        self.http_buf.clear();
        self.http_buf_len = 0;
        self.http_reply.clear();
        self.http_content_len = 0;
        self.http_chunked = false;
        self.data_compressed = ContentEncoding::None;
        self.proxy.tunnel_established = matches!(self.proxy.kind, ProxyKind::None);
    }
}
