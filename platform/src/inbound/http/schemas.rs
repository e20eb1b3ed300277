//! Wire schemas for entity field groups.
//!
//! These mirror [`crate::domain::entity`] for request and response bodies,
//! except that every field is required: a schema describes a row as it is
//! reported, not as it is created. Wire names follow the persisted columns
//! (`ID`, `UUID`, `created_at`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `UUID` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UuidSchema {
    /// Entity identifier.
    #[serde(rename = "UUID")]
    pub uuid: Uuid,
}

/// `created_at` and `updated_at` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampSchema {
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Last update instant.
    pub updated_at: DateTime<Utc>,
}

/// `deleted_at` and `deleted_by` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftDeleteSchema {
    /// Deletion instant.
    pub deleted_at: DateTime<Utc>,
    /// Who deleted the entity.
    pub deleted_by: Uuid,
}

/// `created_by` and `updated_by` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSchema {
    /// Creator.
    pub created_by: Uuid,
    /// Last editor.
    pub updated_by: Uuid,
}

/// `deactivated_at` and `deactivated_by` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSchema {
    /// Deactivation instant.
    pub deactivated_at: DateTime<Utc>,
    /// Who deactivated the entity.
    pub deactivated_by: Uuid,
}

/// `order` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSchema {
    /// Sort position.
    pub order: i32,
}

/// Timestamps plus soft deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullTimestampSchema {
    /// Creation and update instants.
    #[serde(flatten)]
    pub timestamps: TimestampSchema,
    /// Deletion fields.
    #[serde(flatten)]
    pub soft_delete: SoftDeleteSchema,
}

/// UUID plus full timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseEntitySchema {
    /// Entity identifier.
    #[serde(flatten)]
    pub uuid: UuidSchema,
    /// Timestamps and deletion fields.
    #[serde(flatten)]
    pub full_timestamps: FullTimestampSchema,
}

/// All six field groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullEntitySchema {
    /// Entity identifier.
    #[serde(flatten)]
    pub uuid: UuidSchema,
    /// Creation and update instants.
    #[serde(flatten)]
    pub timestamps: TimestampSchema,
    /// Deletion fields.
    #[serde(flatten)]
    pub soft_delete: SoftDeleteSchema,
    /// Audit fields.
    #[serde(flatten)]
    pub audit: AuditSchema,
    /// Deactivation fields.
    #[serde(flatten)]
    pub active: ActiveSchema,
    /// Sort position.
    #[serde(flatten)]
    pub order: OrderSchema,
}

/// `ID` plus any schema field group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRecord<F> {
    /// Primary key.
    #[serde(rename = "ID")]
    pub id: i64,
    /// Composed field groups.
    #[serde(flatten)]
    pub fields: F,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ViolationKind;
    use crate::inbound::http::validation::violation_from_json;
    use rstest::rstest;
    use serde_json::{Value, json};

    fn full_entity_json() -> Value {
        json!({
            "ID": 3,
            "UUID": "00000000-0000-0000-0000-00000000000a",
            "created_at": "2024-05-01T09:00:00Z",
            "updated_at": "2024-05-02T09:00:00Z",
            "deleted_at": "2024-05-03T09:00:00Z",
            "deleted_by": "00000000-0000-0000-0000-00000000000b",
            "created_by": "00000000-0000-0000-0000-00000000000c",
            "updated_by": "00000000-0000-0000-0000-00000000000d",
            "deactivated_at": "2024-05-04T09:00:00Z",
            "deactivated_by": "00000000-0000-0000-0000-00000000000e",
            "order": 2,
        })
    }

    #[rstest]
    fn full_entity_uses_flat_wire_names() {
        let record: SchemaRecord<FullEntitySchema> =
            serde_json::from_value(full_entity_json()).expect("schema parses");
        assert_eq!(record.id, 3);
        assert_eq!(record.fields.order.order, 2);
        assert_eq!(record.fields.audit.updated_by, Uuid::from_u128(0xd));

        let encoded = serde_json::to_value(&record).expect("schema serialises");
        assert_eq!(encoded, full_entity_json());
    }

    #[rstest]
    #[case("deleted_by")]
    #[case("UUID")]
    #[case("created_at")]
    #[case("order")]
    fn every_field_is_required(#[case] missing: &str) {
        let mut body = full_entity_json();
        body.as_object_mut().expect("object").remove(missing);

        let err = serde_json::from_value::<SchemaRecord<FullEntitySchema>>(body)
            .expect_err("missing field rejected");
        let violation = violation_from_json(&err);
        assert_eq!(violation.kind, ViolationKind::Missing);
        assert_eq!(violation.field, format!("body -> {missing}"));
    }

    #[rstest]
    fn base_entity_carries_uuid_once() {
        let record: SchemaRecord<BaseEntitySchema> =
            serde_json::from_value(full_entity_json()).expect("extra fields ignored");
        let encoded = serde_json::to_value(record).expect("schema serialises");
        let mut keys: Vec<&str> = encoded
            .as_object()
            .expect("object")
            .keys()
            .map(String::as_str)
            .collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            ["ID", "UUID", "created_at", "deleted_at", "deleted_by", "updated_at"]
        );
    }
}
