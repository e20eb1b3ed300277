//! Field groups shared by persisted entities.
//!
//! Each group is a small struct; entities compose the groups they need with
//! `#[serde(flatten)]` instead of inheriting columns. Defaults are applied on
//! construction: a fresh UUID, timestamps taken from the supplied clock,
//! ordering zero and no deletion.
//!
//! ```
//! use mockable::DefaultClock;
//! use platform_kit::domain::entity::{FullEntity, Record};
//! use uuid::Uuid;
//!
//! let row = Record::new(1, FullEntity::new(&DefaultClock, Uuid::new_v4()));
//! assert!(!row.fields.soft_delete.is_deleted());
//! assert_eq!(row.fields.ordering.order, 0);
//! ```

use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Globally unique identifier column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityUuid {
    /// Random v4 identifier.
    #[serde(rename = "UUID")]
    pub uuid: Uuid,
}

impl EntityUuid {
    /// Allocate a random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            uuid: Uuid::new_v4(),
        }
    }
}

impl Default for EntityUuid {
    fn default() -> Self {
        Self::generate()
    }
}

/// Creation and last-update instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// When the row last changed.
    pub updated_at: DateTime<Utc>,
}

impl Timestamps {
    /// Both instants set to the clock's current time.
    #[must_use]
    pub fn new(clock: &impl Clock) -> Self {
        let now = clock.utc();
        Self {
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a modification.
    pub fn touch(&mut self, clock: &impl Clock) {
        self.updated_at = clock.utc();
    }
}

/// Soft deletion marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftDelete {
    /// When the row was deleted; `None` while live.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl SoftDelete {
    /// Mark the row deleted now. Keeps the first deletion instant.
    pub fn mark_deleted(&mut self, clock: &impl Clock) {
        if self.deleted_at.is_none() {
            self.deleted_at = Some(clock.utc());
        }
    }

    /// Clear the deletion marker.
    pub fn restore(&mut self) {
        self.deleted_at = None;
    }

    /// Whether the row is deleted.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Who created and last updated the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audit {
    /// Creator, always known.
    pub created_by: Uuid,
    /// Last editor, once the row has been edited.
    pub updated_by: Option<Uuid>,
}

impl Audit {
    /// Audit trail for a freshly created row.
    #[must_use]
    pub const fn new(created_by: Uuid) -> Self {
        Self {
            created_by,
            updated_by: None,
        }
    }

    /// Record the editor of the latest change.
    pub fn record_update(&mut self, updated_by: Uuid) {
        self.updated_by = Some(updated_by);
    }
}

/// Manual sort position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Ordering {
    /// Position; lower sorts first.
    pub order: i32,
}

/// Timestamps plus soft deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullTimestamps {
    /// Creation and update instants.
    #[serde(flatten)]
    pub timestamps: Timestamps,
    /// Deletion marker.
    #[serde(flatten)]
    pub soft_delete: SoftDelete,
}

impl FullTimestamps {
    /// Live row created now.
    #[must_use]
    pub fn new(clock: &impl Clock) -> Self {
        Self {
            timestamps: Timestamps::new(clock),
            soft_delete: SoftDelete::default(),
        }
    }
}

/// UUID plus full timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseEntity {
    /// Unique identifier.
    #[serde(flatten)]
    pub uuid: EntityUuid,
    /// Timestamps and deletion marker.
    #[serde(flatten)]
    pub full_timestamps: FullTimestamps,
}

impl BaseEntity {
    /// Fresh live entity.
    #[must_use]
    pub fn new(clock: &impl Clock) -> Self {
        Self {
            uuid: EntityUuid::generate(),
            full_timestamps: FullTimestamps::new(clock),
        }
    }
}

/// Every field group: UUID, timestamps, audit, soft deletion and ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullEntity {
    /// Unique identifier.
    #[serde(flatten)]
    pub uuid: EntityUuid,
    /// Creation and update instants.
    #[serde(flatten)]
    pub timestamps: Timestamps,
    /// Audit trail.
    #[serde(flatten)]
    pub audit: Audit,
    /// Deletion marker.
    #[serde(flatten)]
    pub soft_delete: SoftDelete,
    /// Sort position.
    #[serde(flatten)]
    pub ordering: Ordering,
}

impl FullEntity {
    /// Fresh live entity created by `created_by`.
    #[must_use]
    pub fn new(clock: &impl Clock, created_by: Uuid) -> Self {
        Self {
            uuid: EntityUuid::generate(),
            timestamps: Timestamps::new(clock),
            audit: Audit::new(created_by),
            soft_delete: SoftDelete::default(),
            ordering: Ordering::default(),
        }
    }

    /// Record a modification by `editor`.
    pub fn record_update(&mut self, clock: &impl Clock, editor: Uuid) {
        self.timestamps.touch(clock);
        self.audit.record_update(editor);
    }
}

/// Integer primary key plus a field group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record<F> {
    /// Primary key.
    #[serde(rename = "ID")]
    pub id: i64,
    /// Composed field groups.
    #[serde(flatten)]
    pub fields: F,
}

impl<F> Record<F> {
    /// Pair a primary key with its fields.
    pub const fn new(id: i64, fields: F) -> Self {
        Self { id, fields }
    }
}
