// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Result-code taxonomy for a transaction, and the PAL-facing error types
//! that feed into it.

use thiserror::Error;

/// Terminal (or transient, for [`TransactResult::InProgress`] /
/// [`TransactResult::TxBuffTooSmall`]) outcome of a single transaction.
///
/// Exactly one non-transient member of this enum is ever delivered per
/// transaction, via the notifier's `trans_outcome`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TransactResult {
    #[error("transaction started")]
    Started,
    #[error("transaction completed successfully")]
    Ok,
    #[error("transaction timed out")]
    Timeout,
    #[error("transaction aborted")]
    Aborted,
    #[error("transaction cancelled")]
    Cancelled,
    #[error("I/O error")]
    IoError,
    #[error("non-2xx HTTP response")]
    HttpError,
    #[error("address resolution failed")]
    AddrResolutionFailed,
    #[error("connect failed")]
    ConnectFailed,
    #[error("connect timed out")]
    ConnectionTimeout,
    #[error("reply exceeded buffer capacity")]
    ReplyTooBig,
    #[error("internal error")]
    InternalError,
    #[error("operation in progress")]
    InProgress,
    #[error("header line too large for buffer")]
    TxBuffTooSmall,
}

impl TransactResult {
    /// Result codes after which a connection must not be kept alive,
    /// regardless of keep-alive configuration (§4.4 Outcome and close).
    pub fn forces_close(self) -> bool {
        matches!(
            self,
            TransactResult::AddrResolutionFailed
                | TransactResult::ConnectFailed
                | TransactResult::ConnectionTimeout
                | TransactResult::Timeout
                | TransactResult::Aborted
                | TransactResult::IoError
                | TransactResult::Cancelled
                | TransactResult::Started
                | TransactResult::InternalError
        )
    }
}

/// Failures surfaced by a [`crate::pal::Pal`] implementation that do not
/// already carry a [`TransactResult`] meaning of their own.
#[derive(Debug, Error)]
pub enum PalError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("socket not registered for readiness events")]
    NotRegistered,
}

impl From<PalError> for TransactResult {
    fn from(_: PalError) -> Self {
        TransactResult::IoError
    }
}
