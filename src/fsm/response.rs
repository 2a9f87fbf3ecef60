// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Response reception (§4.4 "Response reception"): `RX_HTTP_VER` through
//! body completion, including chunked transfer-encoding decoding.

use tracing::{trace, warn};

use crate::{
    constants::CHUNK_TRAIL_LENGTH,
    context::{Context, ContentEncoding},
    error::TransactResult,
    fsm::states::{State, Transition},
    pal::{LineReadStatus, Pal, ReadStatus},
};

fn fail(ctx: &mut Context, result: TransactResult) -> Transition<()> {
    ctx.last_result = Some(result);
    Transition::Next(State::WaitCancel)
}

fn take_line<P: Pal>(pal: &mut P, ctx: &mut Context) -> Option<Result<Vec<u8>, TransactResult>> {
    match pal.line_read_status(ctx) {
        LineReadStatus::InProgress => None,
        LineReadStatus::Ok => Some(Ok(Vec::new())),
        LineReadStatus::TxBuffTooSmall => Some(Err(TransactResult::TxBuffTooSmall)),
        LineReadStatus::Error => Some(Err(TransactResult::IoError)),
    }
}

pub fn dispatch<P: Pal>(state: State, ctx: &mut Context, pal: &mut P) -> Transition<()> {
    match state {
        State::RxHttpVer => match take_line(pal, ctx) {
            None => Transition::Stay,
            Some(Err(e)) => fail(ctx, e),
            Some(Ok(_)) => parse_status_line(ctx),
        },

        other => dispatch_inner(other, ctx, pal),
    }
}

fn parse_status_line(ctx: &mut Context) -> Transition<()> {
    let line = std::mem::take(&mut ctx.http_buf);
    let trimmed = line.strip_suffix(b"\r\n").unwrap_or(&line);
    let text = match std::str::from_utf8(trimmed) {
        Ok(t) => t,
        Err(_) => return fail(ctx, TransactResult::IoError),
    };
    if !text.starts_with("HTTP/1.") {
        return fail(ctx, TransactResult::IoError);
    }
    let code = text
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse::<u16>().ok());
    match code {
        Some(code) => {
            ctx.http_code = code;
            ctx.http_content_len = 0;
            ctx.http_chunked = false;
            ctx.http_buf_len = 0;
            Transition::Next(State::RxHeaders)
        },
        None => fail(ctx, TransactResult::IoError),
    }
}

fn dispatch_inner<P: Pal>(state: State, ctx: &mut Context, pal: &mut P) -> Transition<()> {
    match state {
        State::RxHttpVer => unreachable!("handled by caller"),

        State::RxHeaders => {
            pal.start_read_line(ctx);
            Transition::Next(State::RxHeaderLine)
        },

        State::RxHeaderLine => match take_line(pal, ctx) {
            None => Transition::Stay,
            Some(Err(TransactResult::TxBuffTooSmall)) => {
                warn!("header line exceeded buffer; skipping (§4.4 RX_HEADERS)");
                pal.start_read_line(ctx);
                Transition::Next(State::RxHeaderLine)
            },
            Some(Err(e)) => fail(ctx, e),
            Some(Ok(_)) => handle_header_line(ctx, pal),
        },

        State::RxChunkLen => {
            pal.start_read_line(ctx);
            Transition::Next(State::RxChunkLenLine)
        },

        State::RxChunkLenLine => match take_line(pal, ctx) {
            None => Transition::Stay,
            Some(Err(e)) => fail(ctx, e),
            Some(Ok(_)) => handle_chunk_len_line(ctx, pal),
        },

        State::RxBody => {
            let remaining = ctx.http_content_len.saturating_sub(ctx.http_buf_len);
            if remaining == 0 {
                return Transition::Next(State::Ready);
            }
            pal.start_read(ctx, remaining);
            Transition::Next(State::RxBodyWait)
        },

        State::RxBodyWait => match pal.read_status(ctx) {
            ReadStatus::InProgress => Transition::Stay,
            ReadStatus::Error => fail(ctx, TransactResult::IoError),
            ReadStatus::Ok => {
                if ctx.http_buf_len >= ctx.http_content_len {
                    Transition::Next(State::Ready)
                } else {
                    Transition::Next(State::RxBody)
                }
            },
        },

        State::RxBodyChunk => {
            let remaining = ctx.http_content_len.saturating_sub(ctx.http_buf_len);
            if remaining == 0 {
                return Transition::Next(State::RxChunkLen);
            }
            pal.start_read(ctx, remaining);
            Transition::Next(State::RxBodyChunkWait)
        },

        State::RxBodyChunkWait => match pal.read_status(ctx) {
            ReadStatus::InProgress => Transition::Stay,
            ReadStatus::Error => fail(ctx, TransactResult::IoError),
            ReadStatus::Ok => {
                if ctx.http_buf_len >= ctx.http_content_len {
                    trim_chunk_trailer(ctx);
                    Transition::Next(State::RxChunkLen)
                } else {
                    Transition::Next(State::RxBodyChunk)
                }
            },
        },

        other => {
            trace!(state = %other, "response::dispatch called for a non-response state");
            Transition::Stay
        },
    }
}

/// Drop the trailing `CHUNK_TRAIL_LENGTH` bytes (the chunk's `\r\n`) that
/// were read along with its body (§4.4 "Chunked decoding").
fn trim_chunk_trailer(ctx: &mut Context) {
    let new_len = ctx.http_reply.len().saturating_sub(CHUNK_TRAIL_LENGTH);
    ctx.http_reply.truncate(new_len);
    ctx.http_buf_len = ctx.http_buf_len.saturating_sub(CHUNK_TRAIL_LENGTH);
    ctx.http_content_len = 0;
}

fn handle_header_line<P: Pal>(ctx: &mut Context, pal: &mut P) -> Transition<()> {
    // The PAL's line buffer content is exposed through `ctx.http_reply`
    // tail in this engine (mock/tcp PALs append consumed line bytes there
    // is not the contract; instead each PAL keeps its own scratch and the
    // FSM reads back only status). We rely on `pal` implementations
    // surfacing the line through `ctx.http_buf` for header parsing.
    let line = std::mem::take(&mut ctx.http_buf);
    let trimmed = line.strip_suffix(b"\r\n").unwrap_or(&line);

    if trimmed.is_empty() {
        return terminate_headers(ctx);
    }

    if starts_with(trimmed, b"Transfer-Encoding:") && contains(trimmed, b"chunked") {
        ctx.http_chunked = true;
    } else if let Some(value) = strip_header(trimmed, b"Content-Length:") {
        match std::str::from_utf8(value).ok().and_then(|s| s.trim().parse::<usize>().ok()) {
            Some(len) => ctx.http_content_len = len,
            None => return fail(ctx, TransactResult::IoError),
        }
    } else if starts_with(trimmed, b"Connection:") && contains(trimmed, b"close") {
        ctx.keep_alive.should_close = true;
    } else if starts_with(trimmed, b"Content-Encoding:") && contains(trimmed, b"gzip") {
        ctx.data_compressed = ContentEncoding::Gzip;
    }

    pal.start_read_line(ctx);
    Transition::Next(State::RxHeaderLine)
}

fn terminate_headers(ctx: &mut Context) -> Transition<()> {
    if ctx.http_chunked {
        Transition::Next(State::RxChunkLen)
    } else if ctx.http_content_len == 0 {
        if matches!(ctx.proxy.kind, crate::context::ProxyKind::HttpConnect) && !ctx.proxy.tunnel_established {
            Transition::Next(State::Ready)
        } else {
            fail(ctx, TransactResult::IoError)
        }
    } else {
        Transition::Next(State::RxBody)
    }
}

fn handle_chunk_len_line<P: Pal>(ctx: &mut Context, pal: &mut P) -> Transition<()> {
    let line = std::mem::take(&mut ctx.http_buf);
    let trimmed = line.strip_suffix(b"\r\n").unwrap_or(&line);
    let hex_part = trimmed.split(|&b| b == b';').next().unwrap_or(trimmed);
    let text = match std::str::from_utf8(hex_part) {
        Ok(t) => t.trim(),
        Err(_) => return fail(ctx, TransactResult::IoError),
    };
    let chunk_len = match usize::from_str_radix(text, 16) {
        Ok(n) => n,
        Err(_) => return fail(ctx, TransactResult::IoError),
    };

    if chunk_len == 0 {
        return Transition::Next(State::Ready);
    }

    ctx.http_content_len = chunk_len + CHUNK_TRAIL_LENGTH;
    ctx.http_buf_len = 0;
    let _ = pal;
    Transition::Next(State::RxBodyChunk)
}

/// Case-sensitive by design: the source this engine is modeled on matches
/// header names case-sensitively by prefix, which is non-compliant with
/// HTTP/1.1 (servers may send e.g. `content-length`). Reproduced as-is for
/// fidelity rather than "fixed" — flagged here per the open question on
/// header case sensitivity.
fn starts_with(haystack: &[u8], prefix: &[u8]) -> bool {
    haystack.len() >= prefix.len() && haystack[..prefix.len()] == *prefix
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() || haystack.len() < needle.len() {
        return needle.is_empty();
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

fn strip_header<'a>(line: &'a [u8], prefix: &[u8]) -> Option<&'a [u8]> {
    if starts_with(line, prefix) {
        Some(&line[prefix.len()..])
    } else {
        None
    }
}
