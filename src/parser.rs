// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Protocol Parser Table (§4.3): a static dispatch table, keyed by
//! transaction kind, that turns a completed HTTP body into a domain-level
//! result code.

use crate::{
    context::{Context, TransactionKind, TRANSACTION_KIND_COUNT},
    error::TransactResult,
};

/// A parser consulted once, at body completion, for a given transaction
/// kind. Receives the accumulated (and by then decompressed) body.
pub type ParserFn = fn(&mut Context) -> TransactResult;

fn parse_get(_ctx: &mut Context) -> TransactResult {
    TransactResult::Ok
}

fn parse_head(ctx: &mut Context) -> TransactResult {
    if !ctx.http_reply.is_empty() {
        return TransactResult::InternalError;
    }
    TransactResult::Ok
}

fn parse_post(_ctx: &mut Context) -> TransactResult {
    TransactResult::Ok
}

fn dont_parse(_ctx: &mut Context) -> TransactResult {
    TransactResult::InternalError
}

/// Table sized exactly to [`TRANSACTION_KIND_COUNT`] (§4.3 "compile-time
/// checked"); unused slots would point at [`dont_parse`], a guard parser
/// returning `InternalError`.
static PARSERS: [ParserFn; TRANSACTION_KIND_COUNT] = [parse_get, parse_head, parse_post];

const _PARSER_TABLE_LEN_MATCHES_TRANSACTION_KINDS: () = assert!(PARSERS.len() == TRANSACTION_KIND_COUNT);

/// Look up and invoke the parser for `ctx.trans`. Consulted exactly once,
/// from `finish` (§4.4 Finalization).
pub fn parse_pubnub_result(ctx: &mut Context) -> TransactResult {
    match ctx.trans {
        Some(kind) => PARSERS[kind as usize](ctx),
        None => dont_parse(ctx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_one_entry_per_transaction_kind() {
        assert_eq!(PARSERS.len(), TRANSACTION_KIND_COUNT);
    }

    #[test]
    fn get_parses_to_ok() {
        let mut ctx = Context::new("h");
        ctx.trans = Some(TransactionKind::Get);
        assert_eq!(parse_pubnub_result(&mut ctx), TransactResult::Ok);
    }

    #[test]
    fn head_rejects_nonempty_body() {
        let mut ctx = Context::new("h");
        ctx.trans = Some(TransactionKind::Head);
        ctx.http_reply.extend_from_slice(b"unexpected");
        assert_eq!(parse_pubnub_result(&mut ctx), TransactResult::InternalError);
    }

    #[test]
    fn missing_trans_uses_guard_parser() {
        let mut ctx = Context::new("h");
        assert_eq!(parse_pubnub_result(&mut ctx), TransactResult::InternalError);
    }
}
