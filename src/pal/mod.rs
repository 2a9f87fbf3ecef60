// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Platform Abstraction Layer (§6): the narrow, non-blocking capability set
//! the FSM drives sockets through. The FSM core never touches a socket
//! directly; it only ever calls through a [`Pal`] implementation.

pub mod mock;
pub mod tcp;

use crate::context::Context;

/// Outcome of a non-blocking socket operation that can still be pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoStatus {
    /// The primitive completed.
    Done,
    /// The primitive would block; wait for a readiness event and retry.
    WouldBlock,
    /// The primitive failed.
    Failed,
}

/// Outcome of `resolv_and_connect` / `check_connect` (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStatus {
    SendWouldBlock,
    Sent,
    RcvWouldBlock,
    ConnectWouldBlock,
    ConnectSuccess,
    Failed,
}

/// Outcome of a line-read primitive (§6 `line_read_status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineReadStatus {
    Ok,
    InProgress,
    TxBuffTooSmall,
    Error,
}

/// Outcome of a bulk-read primitive (§6 `read_status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    Ok,
    InProgress,
    Error,
}

/// Direction of readiness a context should be watched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchDirection {
    In,
    Out,
}

/// The platform's non-blocking socket capability set (§6).
///
/// Implementations are expected to be cheap to call repeatedly: the FSM
/// polls them from `step` until they report [`IoStatus::Done`] or a
/// terminal failure.
pub trait Pal {
    fn resolv_and_connect(&mut self, ctx: &mut Context) -> ConnectStatus;
    fn check_resolv_and_connect(&mut self, ctx: &mut Context) -> ConnectStatus;
    fn check_connect(&mut self, ctx: &mut Context) -> ConnectStatus;

    /// Register the (by now connected) socket for readiness events.
    /// Returns `-1` on failure, `0` if registration is immediate, `+1` if
    /// pending.
    fn got_socket(&mut self, ctx: &mut Context) -> i32;
    fn update_socket(&mut self, ctx: &mut Context);
    fn forget(&mut self, ctx: &mut Context);
    fn lost_socket(&mut self, ctx: &mut Context);

    fn watch_events(&mut self, ctx: &mut Context, direction: WatchDirection);

    fn send_literal_str(&mut self, ctx: &mut Context, s: &'static str) -> IoStatus;
    fn send_str(&mut self, ctx: &mut Context, s: &str) -> IoStatus;
    fn send_status(&mut self, ctx: &mut Context) -> IoStatus;

    fn start_read_line(&mut self, ctx: &mut Context);
    fn line_read_status(&mut self, ctx: &mut Context) -> LineReadStatus;

    fn start_read(&mut self, ctx: &mut Context, n: usize);
    fn read_status(&mut self, ctx: &mut Context) -> ReadStatus;
    fn read_len(&mut self, ctx: &Context) -> usize;

    /// Returns `>0` while close is pending, `<=0` once it has completed.
    fn close(&mut self, ctx: &mut Context) -> i32;
    fn closed(&mut self, ctx: &Context) -> bool;
}
