//! Per-line synchronisation state for authenticated carts.
//!
//! Each key moves `Idle -> OptimisticApplied -> {Confirmed | RolledBack} -> Idle`.
//! The baseline is the last line the server confirmed for the key and is what
//! a failed mutation reverts to. Versions are issued by the store in
//! increasing order, so an acknowledgement for anything but the latest
//! in-flight version is superseded: it may advance the baseline but never
//! touches what the shopper sees.

use crate::cart::CartLine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinePhase {
    Idle,
    OptimisticApplied { version: u64 },
}

/// Outcome of settling one remote acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Settlement {
    /// The latest mutation for the key was accepted.
    Confirmed,
    /// The latest mutation for the key failed; show this line instead.
    /// `None` means the server holds no line for the key.
    RolledBack(Option<CartLine>),
    /// A newer mutation is in flight; its own settlement decides.
    Superseded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LineSync {
    phase: LinePhase,
    baseline: Option<CartLine>,
    baseline_version: u64,
}

impl LineSync {
    /// A key the server has never confirmed.
    pub(crate) fn new() -> Self {
        Self {
            phase: LinePhase::Idle,
            baseline: None,
            baseline_version: 0,
        }
    }

    /// A key whose server state is known to be `line`.
    pub(crate) fn confirmed(line: CartLine) -> Self {
        Self {
            phase: LinePhase::Idle,
            baseline: Some(line),
            baseline_version: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn phase(&self) -> LinePhase {
        self.phase
    }

    pub(crate) fn is_pending(&self) -> bool {
        matches!(self.phase, LinePhase::OptimisticApplied { .. })
    }

    #[cfg(test)]
    pub(crate) fn baseline(&self) -> Option<&CartLine> {
        self.baseline.as_ref()
    }

    /// Whether the server currently holds a line for this key.
    pub(crate) fn exists_remotely(&self) -> bool {
        self.baseline.is_some()
    }

    /// Record that mutation `version` has been applied locally.
    pub(crate) fn begin(&mut self, version: u64) {
        self.phase = LinePhase::OptimisticApplied { version };
    }

    /// The server accepted mutation `version`, leaving `line` (or nothing).
    pub(crate) fn confirm(&mut self, version: u64, line: Option<CartLine>) -> Settlement {
        if version > self.baseline_version {
            self.baseline = line;
            self.baseline_version = version;
        }
        self.settle(version, Settlement::Confirmed)
    }

    /// The server refused mutation `version`.
    pub(crate) fn reject(&mut self, version: u64) -> Settlement {
        let restored = self.baseline.clone();
        self.settle(version, Settlement::RolledBack(restored))
    }

    fn settle(&mut self, version: u64, outcome: Settlement) -> Settlement {
        match self.phase {
            LinePhase::OptimisticApplied { version: latest } if latest == version => {
                self.phase = LinePhase::Idle;
                outcome
            }
            _ => Settlement::Superseded,
        }
    }
}

impl Default for LineSync {
    fn default() -> Self {
        Self::new()
    }
}
