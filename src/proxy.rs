// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! HTTP proxy helper (§4.4 Request emission / Finalization, §9 Design Notes
//! open question on saved-path asymmetry).
//!
//! The core FSM calls into this module at two points: when it needs the
//! proxy-specific literal/auth fragments to emit, and at `finish` to let
//! the proxy interpret the just-completed response (most importantly: did
//! the CONNECT tunnel just come up).

use crate::{context::{Context, ProxyKind}, error::TransactResult};

/// What `finish` should do next, as decided by [`handle_finish`].
pub enum ProxyFinishAction {
    /// Not a proxy-relevant response; continue normal finalization.
    PassThrough,
    /// The CONNECT tunnel is up; reset state and resend the real request
    /// inside it.
    TunnelEstablished,
    /// The proxy told us to retry this request (e.g. after auth), closing
    /// first if keep-alive wants to.
    RetryAfterClose,
    /// The proxy response itself is an error.
    Error(TransactResult),
}

/// Build the proxy-authorization header fragment for `ctx`, or an empty
/// string if no credentials are configured. Kept minimal: real credential
/// schemes are a concern of the surrounding application, not this engine.
pub fn authorization_header(ctx: &Context) -> String {
    match ctx.proxy.kind {
        ProxyKind::None => String::new(),
        ProxyKind::HttpGet | ProxyKind::HttpConnect => String::new(),
    }
}

/// Save the real request path before it is overwritten by a CONNECT
/// preamble, or restore it once the tunnel is up. Mirrors the asymmetric
/// `proxy_saved_path` memcpy/memmove noted in the Design Notes: HTTP GET
/// proxying rewrites the path once (scheme+host prefixed) and never
/// restores it, while CONNECT tunneling swaps the CONNECT target out for
/// the saved real path once the tunnel is confirmed.
pub fn save_path(ctx: &mut Context) {
    ctx.proxy.saved_path = ctx.path.as_bytes().to_vec();
}

pub fn restore_path(ctx: &mut Context) {
    if !ctx.proxy.saved_path.is_empty() {
        ctx.path = String::from_utf8_lossy(&ctx.proxy.saved_path).into_owned();
    }
}

/// §4.4 Finalization step 1: interpret a just-completed response when a
/// proxy is in play.
pub fn handle_finish(ctx: &mut Context) -> ProxyFinishAction {
    match ctx.proxy.kind {
        ProxyKind::None => ProxyFinishAction::PassThrough,
        ProxyKind::HttpGet => ProxyFinishAction::PassThrough,
        ProxyKind::HttpConnect => {
            if ctx.proxy.tunnel_established {
                return ProxyFinishAction::PassThrough;
            }
            if ctx.http_code / 100 == 2 {
                ctx.proxy.tunnel_established = true;
                restore_path(ctx);
                ProxyFinishAction::TunnelEstablished
            } else {
                ProxyFinishAction::Error(TransactResult::HttpError)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_tunnel_up_on_2xx() {
        let mut ctx = Context::new("h");
        ctx.proxy.kind = ProxyKind::HttpConnect;
        ctx.path = "/real".into();
        save_path(&mut ctx);
        ctx.path = "h:80".into();
        ctx.http_code = 200;

        match handle_finish(&mut ctx) {
            ProxyFinishAction::TunnelEstablished => {},
            _ => panic!("expected tunnel established"),
        }
        assert!(ctx.proxy.tunnel_established);
        assert_eq!(ctx.path, "/real");
    }

    #[test]
    fn connect_tunnel_rejects_non_2xx() {
        let mut ctx = Context::new("h");
        ctx.proxy.kind = ProxyKind::HttpConnect;
        ctx.http_code = 403;
        match handle_finish(&mut ctx) {
            ProxyFinishAction::Error(TransactResult::HttpError) => {},
            _ => panic!("expected error"),
        }
    }

    #[test]
    fn no_proxy_is_pass_through() {
        let mut ctx = Context::new("h");
        match handle_finish(&mut ctx) {
            ProxyFinishAction::PassThrough => {},
            _ => panic!("expected pass-through"),
        }
    }
}
