// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Request emission (§4.4 "Request emission"): `CONNECTED` through
//! `TX_FIN_HEAD`, including the proxy-aware GET/SCHEME/HOST/PORT_NUM
//! branching from `send_init_GET_or_CONNECT` (§10.6).
//!
//! The prose sequences in §4.4 are slightly under-specified about exactly
//! where the `Host:` header *value* is written relative to
//! `TX_PROXY_AUTHORIZATION` (§9 open question on saved-path asymmetry).
//! This resolves it the same way for every mode: `TX_VER` always writes
//! the `" HTTP/1.1\r\nHost: "` literal, `TX_ORIGIN` always writes the host
//! header's value next, and `TX_PROXY_AUTHORIZATION` — when a proxy is
//! active and the tunnel (if any) is not yet up — is inserted between
//! `TX_ORIGIN` and `TX_FIN_HEAD`. See DESIGN.md and scenario S6.

use tracing::trace;

use crate::{
    constants::DEFAULT_USER_AGENT,
    context::{Context, ProxyKind},
    error::TransactResult,
    fsm::states::{State, Transition},
    pal::{IoStatus, Pal},
    proxy,
};

/// §10.6 `send_init_GET_or_CONNECT`: the literal chosen for `TX_GET`
/// depends on proxy mode.
pub fn initial_method_literal(ctx: &Context) -> &'static str {
    match ctx.proxy.kind {
        ProxyKind::HttpConnect if !ctx.proxy.tunnel_established => "CONNECT ",
        _ => "GET ",
    }
}

fn proxy_active(ctx: &Context) -> bool {
    !matches!(ctx.proxy.kind, ProxyKind::None) && !ctx.proxy.tunnel_established
}

fn send_and_advance<P: Pal>(pal: &mut P, ctx: &mut Context, text: &str, next: State) -> Transition<()> {
    match pal.send_str(ctx, text) {
        IoStatus::Done => Transition::Next(next),
        IoStatus::WouldBlock => Transition::Stay,
        IoStatus::Failed => {
            ctx.last_result = Some(TransactResult::IoError);
            Transition::Next(State::WaitCancel)
        },
    }
}

pub fn dispatch<P: Pal>(state: State, ctx: &mut Context, pal: &mut P) -> Transition<()> {
    match state {
        State::Connected => {
            ctx.keep_alive.on_connected();
            if !ctx.proxy.tunnel_established && matches!(ctx.proxy.kind, ProxyKind::HttpGet | ProxyKind::HttpConnect) {
                proxy::save_path(ctx);
            }
            Transition::Next(State::TxGet)
        },

        State::TxGet => {
            let method = initial_method_literal(ctx).to_string();
            let next = match ctx.proxy.kind {
                ProxyKind::HttpGet | ProxyKind::HttpConnect if !ctx.proxy.tunnel_established => State::TxScheme,
                _ => State::TxPath,
            };
            send_and_advance(pal, ctx, &method, next)
        },

        State::TxScheme => match ctx.proxy.kind {
            ProxyKind::HttpGet => send_and_advance(pal, ctx, "http://", State::TxHost),
            ProxyKind::HttpConnect if !ctx.proxy.tunnel_established => Transition::Next(State::TxHost),
            _ => Transition::Next(State::TxHost),
        },

        State::TxHost => {
            let origin = ctx.origin.clone();
            let next = match ctx.proxy.kind {
                ProxyKind::HttpConnect if !ctx.proxy.tunnel_established => State::TxPortNum,
                ProxyKind::HttpGet => State::TxPath,
                _ => State::TxPath,
            };
            send_and_advance(pal, ctx, &origin, next)
        },

        State::TxPortNum => send_and_advance(pal, ctx, ":80", State::TxVer),

        State::TxPath => {
            let path = if proxy_active(ctx) && matches!(ctx.proxy.kind, ProxyKind::HttpGet) {
                String::from_utf8_lossy(&ctx.proxy.saved_path).into_owned()
            } else {
                ctx.path.clone()
            };
            send_and_advance(pal, ctx, &path, State::TxVer)
        },

        State::TxVer => send_and_advance(pal, ctx, " HTTP/1.1\r\nHost: ", State::TxOrigin),

        State::TxOrigin => {
            let host_header = if matches!(ctx.proxy.kind, ProxyKind::HttpConnect) && !ctx.proxy.tunnel_established {
                format!("{}:80", ctx.origin)
            } else {
                ctx.origin.clone()
            };
            let next = if proxy_active(ctx) { State::TxProxyAuthorization } else { State::TxFinHead };
            send_and_advance(pal, ctx, &host_header, next)
        },

        State::TxProxyAuthorization => {
            let header = proxy::authorization_header(ctx);
            send_and_advance(pal, ctx, &header, State::TxFinHead)
        },

        State::TxFinHead => {
            let tail = format!("\r\nUser-Agent: {DEFAULT_USER_AGENT}\r\n\r\n");
            match send_and_advance(pal, ctx, &tail, State::RxHttpVer) {
                Transition::Next(State::RxHttpVer) => {
                    pal.start_read_line(ctx);
                    Transition::Next(State::RxHttpVer)
                },
                other => other,
            }
        },

        other => {
            trace!(state = %other, "request::dispatch called for a non-request state");
            Transition::Stay
        },
    }
}
