// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The FSM state enum (§4.4).

/// One of the ~30 states a [`crate::context::Context`] can occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    // Control
    Null,
    Idle,
    Ready,
    Retry,

    // Resolve / connect
    WaitDnsSend,
    WaitDnsRcv,
    WaitConnect,
    Connected,

    // Request emission
    TxGet,
    TxScheme,
    TxHost,
    TxPortNum,
    TxPath,
    TxVer,
    TxProxyAuthorization,
    TxOrigin,
    TxFinHead,

    // Response reception
    RxHttpVer,
    RxHeaders,
    RxHeaderLine,
    RxBody,
    RxBodyWait,
    RxChunkLen,
    RxChunkLenLine,
    RxBodyChunk,
    RxBodyChunkWait,

    // Teardown
    WaitClose,
    WaitCancel,
    WaitCancelClose,

    // Keep-alive
    KeepAliveIdle,
    KeepAliveReady,
    KeepAliveWaitClose,
}

impl State {
    pub fn as_str(self) -> &'static str {
        match self {
            State::Null => "NULL",
            State::Idle => "IDLE",
            State::Ready => "READY",
            State::Retry => "RETRY",
            State::WaitDnsSend => "WAIT_DNS_SEND",
            State::WaitDnsRcv => "WAIT_DNS_RCV",
            State::WaitConnect => "WAIT_CONNECT",
            State::Connected => "CONNECTED",
            State::TxGet => "TX_GET",
            State::TxScheme => "TX_SCHEME",
            State::TxHost => "TX_HOST",
            State::TxPortNum => "TX_PORT_NUM",
            State::TxPath => "TX_PATH",
            State::TxVer => "TX_VER",
            State::TxProxyAuthorization => "TX_PROXY_AUTHORIZATION",
            State::TxOrigin => "TX_ORIGIN",
            State::TxFinHead => "TX_FIN_HEAD",
            State::RxHttpVer => "RX_HTTP_VER",
            State::RxHeaders => "RX_HEADERS",
            State::RxHeaderLine => "RX_HEADER_LINE",
            State::RxBody => "RX_BODY",
            State::RxBodyWait => "RX_BODY_WAIT",
            State::RxChunkLen => "RX_CHUNK_LEN",
            State::RxChunkLenLine => "RX_CHUNK_LEN_LINE",
            State::RxBodyChunk => "RX_BODY_CHUNK",
            State::RxBodyChunkWait => "RX_BODY_CHUNK_WAIT",
            State::WaitClose => "WAIT_CLOSE",
            State::WaitCancel => "WAIT_CANCEL",
            State::WaitCancelClose => "WAIT_CANCEL_CLOSE",
            State::KeepAliveIdle => "KEEP_ALIVE_IDLE",
            State::KeepAliveReady => "KEEP_ALIVE_READY",
            State::KeepAliveWaitClose => "KEEP_ALIVE_WAIT_CLOSE",
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The teacher's `Transition<S, R>` idiom (`state_machine::common::Transition`),
/// adapted to a synchronous step instead of a `Future`-returning one: the
/// spec requires the core FSM to be driven purely by readiness/timer events,
/// with no runtime of its own (§1 Non-goals, §5 Scheduling model).
pub enum Transition<R> {
    /// Advance to the next state; re-dispatch without waiting for an event.
    Next(State),
    /// Stay in the current state; the caller must wait for a readiness
    /// event before calling `step` again.
    Stay,
    /// The transaction reached a terminal state this step; `R` carries the
    /// outcome already published via the notifier.
    Done(R),
}
