//! Cursor model: reserved literals, diagnostic sentinels and numeric positions.
//!
//! A cursor is parsed once at the edge of a fetch and never re-parsed.

use std::fmt;

use crate::error::{FetchError, TransientKind};
use crate::types::{Event, Position};

// ─── Constants ───────────────────────────────────────────────────────

/// Full history.
pub const FIRST_CURSOR: &str = "first";

/// Only the freshest event.
pub const LAST_CURSOR: &str = "last";

/// Diagnostic sentinel: fail with a simulated server fault.
pub const SERVER_FAULT_CURSOR: &str = "_fault_500";

/// Diagnostic sentinel: fail with a simulated gateway timeout.
pub const GATEWAY_TIMEOUT_CURSOR: &str = "_fault_504";

// ─── Cursor ──────────────────────────────────────────────────────────

/// Simulated failure triggered by a diagnostic cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    ServerFault,
    GatewayTimeout,
}

impl FaultKind {
    pub fn transient_kind(self) -> TransientKind {
        match self {
            Self::ServerFault => TransientKind::ServerFault,
            Self::GatewayTimeout => TransientKind::GatewayTimeout,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cursor {
    First,
    Last,
    /// Resume after this position (exclusive).
    At(Position),
    Fault(FaultKind),
}

impl Cursor {
    /// Parse a wire cursor.
    ///
    /// Diagnostic sentinels are only recognised when `diagnostics` is set;
    /// otherwise they are malformed like any other non-numeric string.
    pub fn parse(raw: &str, diagnostics: bool) -> Result<Self, FetchError> {
        match raw {
            FIRST_CURSOR => Ok(Self::First),
            LAST_CURSOR => Ok(Self::Last),
            SERVER_FAULT_CURSOR if diagnostics => Ok(Self::Fault(FaultKind::ServerFault)),
            GATEWAY_TIMEOUT_CURSOR if diagnostics => Ok(Self::Fault(FaultKind::GatewayTimeout)),
            _ => raw
                .parse::<Position>()
                .map(Self::At)
                .map_err(|_| FetchError::invalid_cursor(raw)),
        }
    }

    /// Resolve to an exclusive lower bound over `events` (sorted by position).
    ///
    /// `Ok(None)` means "from the beginning". Fault cursors resolve to their
    /// transient error without looking at the events.
    pub fn resolve(self, events: &[Event]) -> Result<Option<Position>, FetchError> {
        match self {
            Self::First => Ok(None),
            Self::Last => Ok(events
                .last()
                .and_then(|e| e.position().get().checked_sub(1))
                .map(Position)),
            Self::At(position) => Ok(Some(position)),
            Self::Fault(kind) => Err(FetchError::Transient(kind.transient_kind())),
        }
    }
}

impl From<Position> for Cursor {
    fn from(position: Position) -> Self {
        Self::At(position)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => f.write_str(FIRST_CURSOR),
            Self::Last => f.write_str(LAST_CURSOR),
            Self::At(position) => write!(f, "{position}"),
            Self::Fault(FaultKind::ServerFault) => f.write_str(SERVER_FAULT_CURSOR),
            Self::Fault(FaultKind::GatewayTimeout) => f.write_str(GATEWAY_TIMEOUT_CURSOR),
        }
    }
}
