// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A production [`Pal`] over non-blocking `std::net::TcpStream`, the
//! counterpart to the teacher's `client::client::ClientConnection` as the
//! one real transport implementation in the crate.

use std::{
    io::{ErrorKind, Read, Write},
    net::{TcpStream, ToSocketAddrs},
};

use tracing::{debug, trace, warn};

use crate::{
    context::Context,
    pal::{ConnectStatus, IoStatus, LineReadStatus, Pal, ReadStatus, WatchDirection},
};

struct Conn {
    stream: Option<TcpStream>,
    pending_write: Vec<u8>,
    write_off: usize,
    line_buf: Vec<u8>,
    read_target: usize,
    closing: bool,
}

impl Conn {
    fn new() -> Self {
        Conn {
            stream: None,
            pending_write: Vec::new(),
            write_off: 0,
            line_buf: Vec::new(),
            read_target: 0,
            closing: false,
        }
    }
}

/// Non-blocking TCP transport. One [`StdTcpPal`] can drive many contexts;
/// each context's `pal_slot` indexes into an internal slab of connections.
#[derive(Default)]
pub struct StdTcpPal {
    conns: Vec<Option<Conn>>,
}

impl StdTcpPal {
    pub fn new() -> Self {
        StdTcpPal { conns: Vec::new() }
    }

    fn slot(&mut self, ctx: &mut Context) -> usize {
        if let Some(slot) = ctx.pal_slot {
            return slot;
        }
        self.conns.push(Some(Conn::new()));
        let slot = self.conns.len() - 1;
        ctx.pal_slot = Some(slot);
        slot
    }

    fn conn_mut(&mut self, slot: usize) -> &mut Conn {
        self.conns[slot]
            .as_mut()
            .expect("pal_slot referenced a freed connection")
    }
}

impl Pal for StdTcpPal {
    fn resolv_and_connect(&mut self, ctx: &mut Context) -> ConnectStatus {
        let slot = self.slot(ctx);
        let addr = match (ctx.origin.as_str(), 80u16).to_socket_addrs() {
            Ok(mut it) => match it.next() {
                Some(a) => a,
                None => {
                    warn!(origin = %ctx.origin, "address resolution produced no candidates");
                    return ConnectStatus::Failed;
                },
            },
            Err(e) => {
                warn!(origin = %ctx.origin, error = %e, "address resolution failed");
                return ConnectStatus::Failed;
            },
        };
        match TcpStream::connect(addr) {
            Ok(stream) => {
                if stream.set_nonblocking(true).is_err() {
                    return ConnectStatus::Failed;
                }
                debug!(origin = %ctx.origin, "connected");
                self.conn_mut(slot).stream = Some(stream);
                ConnectStatus::ConnectSuccess
            },
            Err(e) if e.kind() == ErrorKind::WouldBlock => ConnectStatus::ConnectWouldBlock,
            Err(e) => {
                warn!(origin = %ctx.origin, error = %e, "connect failed");
                ConnectStatus::Failed
            },
        }
    }

    fn check_resolv_and_connect(&mut self, ctx: &mut Context) -> ConnectStatus {
        self.check_connect(ctx)
    }

    fn check_connect(&mut self, ctx: &mut Context) -> ConnectStatus {
        let slot = self.slot(ctx);
        if self.conn_mut(slot).stream.is_some() {
            ConnectStatus::ConnectSuccess
        } else {
            ConnectStatus::ConnectWouldBlock
        }
    }

    fn got_socket(&mut self, ctx: &mut Context) -> i32 {
        let slot = self.slot(ctx);
        if self.conn_mut(slot).stream.is_some() { 0 } else { -1 }
    }

    fn update_socket(&mut self, _ctx: &mut Context) {}

    fn forget(&mut self, ctx: &mut Context) {
        if let Some(slot) = ctx.pal_slot.take() {
            self.conns[slot] = None;
        }
    }

    fn lost_socket(&mut self, ctx: &mut Context) {
        self.forget(ctx);
    }

    fn watch_events(&mut self, _ctx: &mut Context, direction: WatchDirection) {
        trace!(?direction, "watch_events (edge-triggered by poll loop, no-op here)");
    }

    fn send_literal_str(&mut self, ctx: &mut Context, s: &'static str) -> IoStatus {
        self.send_str(ctx, s)
    }

    fn send_str(&mut self, ctx: &mut Context, s: &str) -> IoStatus {
        let slot = self.slot(ctx);
        let conn = self.conn_mut(slot);
        conn.pending_write.extend_from_slice(s.as_bytes());
        conn.write_off = 0;
        self.send_status(ctx)
    }

    fn send_status(&mut self, ctx: &mut Context) -> IoStatus {
        let slot = self.slot(ctx);
        let conn = self.conn_mut(slot);
        let Some(stream) = conn.stream.as_mut() else {
            return IoStatus::Failed;
        };
        while conn.write_off < conn.pending_write.len() {
            match stream.write(&conn.pending_write[conn.write_off..]) {
                Ok(0) => return IoStatus::Failed,
                Ok(n) => conn.write_off += n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => return IoStatus::WouldBlock,
                Err(_) => return IoStatus::Failed,
            }
        }
        conn.pending_write.clear();
        conn.write_off = 0;
        IoStatus::Done
    }

    fn start_read_line(&mut self, ctx: &mut Context) {
        let slot = self.slot(ctx);
        self.conn_mut(slot).line_buf.clear();
    }

    fn line_read_status(&mut self, ctx: &mut Context) -> LineReadStatus {
        let slot = self.slot(ctx);
        let conn = self.conn_mut(slot);
        let Some(stream) = conn.stream.as_mut() else {
            return LineReadStatus::Error;
        };
        let mut byte = [0u8; 1];
        loop {
            if conn.line_buf.ends_with(b"\r\n") {
                ctx.http_buf = std::mem::take(&mut conn.line_buf);
                return LineReadStatus::Ok;
            }
            if conn.line_buf.len() >= crate::constants::BUF_MAX {
                ctx.http_buf = std::mem::take(&mut conn.line_buf);
                return LineReadStatus::TxBuffTooSmall;
            }
            match stream.read(&mut byte) {
                Ok(0) => return LineReadStatus::Error,
                Ok(_) => conn.line_buf.push(byte[0]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => return LineReadStatus::InProgress,
                Err(_) => return LineReadStatus::Error,
            }
        }
    }

    fn start_read(&mut self, ctx: &mut Context, n: usize) {
        let slot = self.slot(ctx);
        self.conn_mut(slot).read_target = n;
    }

    fn read_status(&mut self, ctx: &mut Context) -> ReadStatus {
        let slot = self.slot(ctx);
        let target = self.conn_mut(slot).read_target;
        let mut buf = vec![0u8; target];
        let conn = self.conn_mut(slot);
        let Some(stream) = conn.stream.as_mut() else {
            return ReadStatus::Error;
        };
        match stream.read(&mut buf) {
            Ok(0) if target > 0 => ReadStatus::Error,
            Ok(n) => {
                ctx.http_reply.extend_from_slice(&buf[..n]);
                ctx.http_buf_len += n;
                ReadStatus::Ok
            },
            Err(e) if e.kind() == ErrorKind::WouldBlock => ReadStatus::InProgress,
            Err(_) => ReadStatus::Error,
        }
    }

    fn read_len(&mut self, ctx: &Context) -> usize {
        ctx.http_buf_len
    }

    fn close(&mut self, ctx: &mut Context) -> i32 {
        let slot = self.slot(ctx);
        let conn = self.conn_mut(slot);
        conn.closing = true;
        if let Some(stream) = conn.stream.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
        0
    }

    fn closed(&mut self, ctx: &Context) -> bool {
        match ctx.pal_slot.and_then(|s| self.conns.get(s)) {
            Some(Some(conn)) => conn.stream.is_none(),
            _ => true,
        }
    }
}
