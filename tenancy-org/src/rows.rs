//! Storage boundary codec
//!
//! Storage backends hand back loosely shaped JSON rows. Every row is decoded
//! into its typed record here, and rejected with
//! [`StoreError::MalformedRow`] when it does not fit, so untyped data never
//! reaches the context manager.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};
use crate::membership::{MembershipStatus, OrganizationMembership};
use crate::organization::{validate_slug, Organization};
use crate::profile::UserProfile;

/// A raw storage row.
pub type Row = Map<String, Value>;

/// A record type that crosses the storage boundary.
pub trait Record: Serialize + DeserializeOwned {
    /// Entity name used in errors.
    const ENTITY: &'static str;

    /// Check invariants serde cannot express.
    fn check(&self) -> Result<(), String> {
        Ok(())
    }
}

impl Record for Organization {
    const ENTITY: &'static str = "organization";

    fn check(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("empty name".to_string());
        }
        validate_slug(&self.slug).map_err(|e| e.to_string())
    }
}

impl Record for OrganizationMembership {
    const ENTITY: &'static str = "membership";

    fn check(&self) -> Result<(), String> {
        if self.status == MembershipStatus::Active && self.joined_at.is_none() {
            return Err("active membership without joined_at".to_string());
        }
        Ok(())
    }
}

impl Record for UserProfile {
    const ENTITY: &'static str = "profile";
}

/// Encode a record into a storage row.
pub fn encode<T: Record>(record: &T) -> StoreResult<Row> {
    match serde_json::to_value(record) {
        Ok(Value::Object(row)) => Ok(row),
        Ok(_) => Err(malformed::<T, _>("record did not encode to an object")),
        Err(e) => Err(malformed::<T, _>(e)),
    }
}

/// Decode and validate a storage row.
pub fn decode<T: Record>(row: Row) -> StoreResult<T> {
    let record: T = serde_json::from_value(Value::Object(row)).map_err(|e| malformed::<T, _>(e))?;
    record.check().map_err(|e| malformed::<T, _>(e))?;
    Ok(record)
}

/// Decode an optional row.
pub fn decode_opt<T: Record>(row: Option<Row>) -> StoreResult<Option<T>> {
    row.map(decode::<T>).transpose()
}

/// Deserialize `null` as the type's default value.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn malformed<T: Record, E: ToString>(reason: E) -> StoreError {
    StoreError::MalformedRow {
        entity: T::ENTITY,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tenancy_rbac::Role;
    use uuid::Uuid;

    fn object(value: Value) -> Row {
        match value {
            Value::Object(row) => row,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_organization_row_roundtrip() {
        let org = Organization::new("Acme", "acme");
        let decoded: Organization = decode(encode(&org).unwrap()).unwrap();
        assert_eq!(decoded, org);
    }

    #[test]
    fn test_null_settings_coerced_to_empty() {
        let mut row = encode(&Organization::new("Acme", "acme")).unwrap();
        row.insert("settings".into(), Value::Null);
        row.remove("domain");

        let org: Organization = decode(row).unwrap();
        assert!(org.settings.is_empty());
        assert!(org.domain.is_none());
    }

    #[test]
    fn test_missing_required_field_rejected() {
        let mut row = encode(&Organization::new("Acme", "acme")).unwrap();
        row.remove("slug");

        let err = decode::<Organization>(row).unwrap_err();
        assert!(matches!(
            err,
            StoreError::MalformedRow {
                entity: "organization",
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_slug_rejected() {
        let mut row = encode(&Organization::new("Acme", "acme")).unwrap();
        row.insert("slug".into(), json!("Not A Slug"));
        assert!(decode::<Organization>(row).is_err());
    }

    #[test]
    fn test_unknown_role_rejected_at_boundary() {
        let membership = OrganizationMembership::active(Uuid::now_v7(), Uuid::now_v7(), Role::Admin);
        let mut row = encode(&membership).unwrap();
        row.insert("role".into(), json!("superuser"));

        assert!(decode::<OrganizationMembership>(row).is_err());
    }

    #[test]
    fn test_active_without_join_date_rejected() {
        let membership = OrganizationMembership::active(Uuid::now_v7(), Uuid::now_v7(), Role::Member);
        let mut row = encode(&membership).unwrap();
        row.insert("joined_at".into(), Value::Null);

        let err = decode::<OrganizationMembership>(row).unwrap_err();
        assert!(err.to_string().contains("joined_at"));
    }

    #[test]
    fn test_non_object_shape_rejected() {
        let row = object(json!({ "id": 7 }));
        assert!(decode::<UserProfile>(row).is_err());
    }
}
