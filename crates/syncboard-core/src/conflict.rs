// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Field-level conflict resolution.
//!
//! Each task field carries a version stamp recording the global row version
//! that last wrote it. A client mutation declares the row version it was
//! built against (`baseVersion`); a proposed field is applied only when its
//! stamp is still at or below that base. A higher stamp proves a concurrent
//! writer got there first, and the server value wins (last-write-wins per
//! field). Disjoint field sets merge losslessly; overlapping sets degrade
//! to per-field LWW.
//!
//! This module is pure. The persistence layer runs it inside the row lock
//! so analysis and write see the same committed state.

use syncboard_protocol::ColumnId;

use crate::persistence::TaskRecord;

/// The logical fields a mutation may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldName {
    /// The task title.
    Title,
    /// The task description.
    Description,
    /// The board column.
    Column,
    /// The fractional position within the column.
    Position,
}

impl FieldName {
    /// The camelCase name used in wire messages.
    pub fn wire_name(&self) -> &'static str {
        match self {
            FieldName::Title => "title",
            FieldName::Description => "description",
            FieldName::Column => "columnId",
            FieldName::Position => "position",
        }
    }
}

/// Proposed new values, one `Option` per logical field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    /// New title, if the mutation edits it.
    pub title: Option<String>,
    /// New description, if the mutation edits it.
    pub description: Option<String>,
    /// New column, if the mutation moves the task.
    pub column_id: Option<ColumnId>,
    /// New position, if the mutation moves the task.
    pub position: Option<f64>,
}

impl ChangeSet {
    /// True when no field is proposed at all.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.column_id.is_none()
            && self.position.is_none()
    }
}

/// Outcome of analysing a mutation against the current row.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictAnalysis {
    /// The subset of proposed changes that may be applied.
    pub merged: ChangeSet,
    /// Fields whose proposed values won.
    pub merged_fields: Vec<FieldName>,
    /// Fields whose proposed values lost to a concurrent writer.
    pub rejected_fields: Vec<FieldName>,
}

impl ConflictAnalysis {
    /// True when at least one field was rejected.
    pub fn has_conflict(&self) -> bool {
        !self.rejected_fields.is_empty()
    }

    /// True when every proposed field was rejected.
    pub fn fully_rejected(&self) -> bool {
        self.merged_fields.is_empty() && !self.rejected_fields.is_empty()
    }

    /// Merged field names in wire form.
    pub fn merged_field_names(&self) -> Vec<String> {
        self.merged_fields
            .iter()
            .map(|f| f.wire_name().to_string())
            .collect()
    }

    /// Rejected field names in wire form.
    pub fn rejected_field_names(&self) -> Vec<String> {
        self.rejected_fields
            .iter()
            .map(|f| f.wire_name().to_string())
            .collect()
    }

    /// Deterministic human-readable explanation, one of three templates
    /// (clean, partial merge, full rejection), naming the affected fields.
    pub fn reason(&self) -> String {
        let merged = field_list(&self.merged_fields);
        let rejected = field_list(&self.rejected_fields);
        if self.rejected_fields.is_empty() {
            if self.merged_fields.is_empty() {
                "No changes requested".to_string()
            } else {
                format!("Applied {} without conflict", merged)
            }
        } else if self.merged_fields.is_empty() {
            format!(
                "Rejected {}: the task was changed by someone else since your last sync",
                rejected
            )
        } else {
            format!(
                "Applied {}; kept newer server values for {}",
                merged, rejected
            )
        }
    }
}

fn field_list(fields: &[FieldName]) -> String {
    fields
        .iter()
        .map(|f| f.wire_name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Analyse a proposed mutation against the current row.
///
/// A field merges when its stamp is at or below `base_version`; otherwise
/// it is rejected and the proposed value discarded. Field order in the
/// result lists is fixed: title, description, columnId, position.
pub fn analyze(current: &TaskRecord, base_version: i64, changes: &ChangeSet) -> ConflictAnalysis {
    let mut analysis = ConflictAnalysis {
        merged: ChangeSet::default(),
        merged_fields: Vec::new(),
        rejected_fields: Vec::new(),
    };

    if let Some(title) = &changes.title {
        if current.title_version <= base_version {
            analysis.merged.title = Some(title.clone());
            analysis.merged_fields.push(FieldName::Title);
        } else {
            analysis.rejected_fields.push(FieldName::Title);
        }
    }

    if let Some(description) = &changes.description {
        if current.description_version <= base_version {
            analysis.merged.description = Some(description.clone());
            analysis.merged_fields.push(FieldName::Description);
        } else {
            analysis.rejected_fields.push(FieldName::Description);
        }
    }

    if let Some(column_id) = changes.column_id {
        if current.column_version <= base_version {
            analysis.merged.column_id = Some(column_id);
            analysis.merged_fields.push(FieldName::Column);
        } else {
            analysis.rejected_fields.push(FieldName::Column);
        }
    }

    if let Some(position) = changes.position {
        if current.position_version <= base_version {
            analysis.merged.position = Some(position);
            analysis.merged_fields.push(FieldName::Position);
        } else {
            analysis.rejected_fields.push(FieldName::Position);
        }
    }

    analysis
}
