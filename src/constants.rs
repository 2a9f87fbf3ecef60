// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Platform-level constants (§6).

/// Upper bound on the header-line / scratch buffer length.
pub const BUF_MAX: usize = 8 * 1024;

/// Trailing bytes consumed (but discarded) after each chunk body: `\r\n`.
pub const CHUNK_TRAIL_LENGTH: usize = 2;

/// Default `User-Agent` literal when not overridden by configuration.
pub const DEFAULT_USER_AGENT: &str = "transact-engine-rs/0.1";
