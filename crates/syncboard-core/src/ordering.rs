// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fractional-index arithmetic for column ordering.
//!
//! Tasks carry a binary-float `position`; inserting between two neighbours
//! takes their midpoint, so a reorder touches exactly one row. A starting
//! step of 2^16 leaves on the order of 2^40 consecutive splits between any
//! two initial neighbours before the gap drops under [`MIN_GAP`], at which
//! point the caller rewrites the whole column via
//! [`Persistence::rebalance_column`](crate::persistence::Persistence::rebalance_column).

/// Gap between consecutive tasks after a rebalance, and the default spacing
/// for appends.
pub const STEP: f64 = 65536.0;

/// Minimum usable gap between neighbours. Anything tighter is treated as
/// precision-exhausted and triggers a rebalance.
pub const MIN_GAP: f64 = 0.5;

/// Position for a task appended to a column.
///
/// `STEP` for an empty column, otherwise `max + STEP`.
pub fn position_at_end(existing: &[f64]) -> f64 {
    existing
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max)
        .max(0.0)
        + STEP
}

/// Position strictly between two neighbours, or `None` when the midpoint
/// would land inside [`MIN_GAP`] of either side (precision exhausted).
///
/// Either bound may be absent: no `before` means "insert at the top", no
/// `after` means "insert at the bottom".
pub fn position_between(before: Option<f64>, after: Option<f64>) -> Option<f64> {
    match (before, after) {
        (None, None) => Some(STEP),
        (None, Some(after)) => {
            let midpoint = after / 2.0;
            (midpoint >= MIN_GAP).then_some(midpoint)
        }
        (Some(before), None) => Some(before + STEP),
        (Some(before), Some(after)) => {
            let gap = after - before;
            (gap >= MIN_GAP).then_some(before + gap / 2.0)
        }
    }
}

/// Position of the `index`-th row (0-based, pre-rebalance order) after a
/// column rebalance: `(index + 1) * STEP`.
pub fn rebalanced_position(index: usize) -> f64 {
    (index as f64 + 1.0) * STEP
}
