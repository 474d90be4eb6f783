use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::field::{field_accessors, FieldValue};
use crate::identity::{ParticipantId, ParticipantKey, RecordId};

/// Demographic projection of a participant, one row per key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemographicSnapshot {
    pub nhs_number: ParticipantKey,
    pub superseded_by_nhs_number: Option<i64>,
    pub primary_care_provider: Option<String>,
    pub primary_care_provider_from_dt: Option<String>,
    pub current_posting: Option<String>,
    pub current_posting_from_dt: Option<String>,
    pub name_prefix: Option<String>,
    pub given_name: Option<String>,
    pub other_given_name: Option<String>,
    pub family_name: Option<String>,
    pub previous_family_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<i64>,
    pub address_line_1: Option<String>,
    pub address_line_2: Option<String>,
    pub address_line_3: Option<String>,
    pub address_line_4: Option<String>,
    pub address_line_5: Option<String>,
    pub post_code: Option<String>,
    pub paf_key: Option<String>,
    pub usual_address_from_dt: Option<String>,
    pub date_of_death: Option<String>,
    pub death_status: Option<i64>,
    pub telephone_number_home: Option<String>,
    pub telephone_number_home_from_dt: Option<String>,
    pub telephone_number_mob: Option<String>,
    pub telephone_number_mob_from_dt: Option<String>,
    pub email_address_home: Option<String>,
    pub email_address_home_from_dt: Option<String>,
    pub preferred_language: Option<String>,
    pub interpreter_required: Option<i64>,
    pub invalid_flag: Option<i64>,
    pub record_insert_datetime: Option<DateTime<Utc>>,
    pub record_update_datetime: Option<DateTime<Utc>>,
}

impl DemographicSnapshot {
    pub fn new(nhs_number: ParticipantKey) -> Self {
        Self {
            nhs_number,
            ..Default::default()
        }
    }
}

field_accessors!(DemographicSnapshot, "demographic", key: nhs_number, {
    superseded_by_nhs_number,
    primary_care_provider,
    primary_care_provider_from_dt,
    current_posting,
    current_posting_from_dt,
    name_prefix,
    given_name,
    other_given_name,
    family_name,
    previous_family_name,
    date_of_birth,
    gender,
    address_line_1,
    address_line_2,
    address_line_3,
    address_line_4,
    address_line_5,
    post_code,
    paf_key,
    usual_address_from_dt,
    date_of_death,
    death_status,
    telephone_number_home,
    telephone_number_home_from_dt,
    telephone_number_mob,
    telephone_number_mob_from_dt,
    email_address_home,
    email_address_home_from_dt,
    preferred_language,
    interpreter_required,
    invalid_flag,
});

/// Screening management projection of a participant, one row per key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagementSnapshot {
    pub nhs_number: ParticipantKey,
    /// Assigned by the store on first insert.
    pub participant_id: Option<ParticipantId>,
    pub screening_id: Option<i64>,
    pub record_type: Option<String>,
    pub eligibility_flag: Option<i64>,
    pub reason_for_removal: Option<String>,
    pub reason_for_removal_from_dt: Option<String>,
    pub business_rule_version: Option<String>,
    pub exception_flag: Option<i64>,
    pub blocked_flag: Option<i64>,
    pub referral_flag: Option<i64>,
    pub next_test_due_date: Option<String>,
    pub next_test_due_date_calc_method: Option<String>,
    pub participant_screening_status: Option<String>,
    pub screening_ceased_reason: Option<String>,
    pub is_higher_risk: Option<i64>,
    /// Raw cohort record this row was last loaded from.
    pub cohort_update_id: Option<RecordId>,
    pub record_insert_datetime: Option<DateTime<Utc>>,
    pub record_update_datetime: Option<DateTime<Utc>>,
}

impl ManagementSnapshot {
    pub fn new(nhs_number: ParticipantKey) -> Self {
        Self {
            nhs_number,
            ..Default::default()
        }
    }
}

field_accessors!(ManagementSnapshot, "management", key: nhs_number, {
    screening_id,
    record_type,
    eligibility_flag,
    reason_for_removal,
    reason_for_removal_from_dt,
    business_rule_version,
    exception_flag,
    blocked_flag,
    referral_flag,
    next_test_due_date,
    next_test_due_date_calc_method,
    participant_screening_status,
    screening_ceased_reason,
    is_higher_risk,
});

/// Which projection a field reference addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubRecord {
    Demographic,
    Management,
}

impl fmt::Display for SubRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Demographic => write!(f, "demographic"),
            Self::Management => write!(f, "management"),
        }
    }
}

/// A `(sub-record, field)` address, displayed as `demographic.post_code`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldRef {
    pub record: SubRecord,
    pub field: String,
}

impl FieldRef {
    pub fn new(record: SubRecord, field: impl Into<String>) -> Self {
        Self {
            record,
            field: field.into(),
        }
    }

    pub fn demographic(field: impl Into<String>) -> Self {
        Self::new(SubRecord::Demographic, field)
    }

    pub fn management(field: impl Into<String>) -> Self {
        Self::new(SubRecord::Management, field)
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.record, self.field)
    }
}

/// Both projections of one participant, as read from the store.
///
/// This is a plain value: mutating it never touches persisted state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantSnapshot {
    pub key: ParticipantKey,
    pub demographic: Option<DemographicSnapshot>,
    pub management: Option<ManagementSnapshot>,
}

impl ParticipantSnapshot {
    pub fn new(
        key: ParticipantKey,
        demographic: Option<DemographicSnapshot>,
        management: Option<ManagementSnapshot>,
    ) -> Self {
        Self {
            key,
            demographic,
            management,
        }
    }

    /// `true` when neither projection exists.
    pub fn is_empty(&self) -> bool {
        self.demographic.is_none() && self.management.is_none()
    }

    pub fn has(&self, record: SubRecord) -> bool {
        match record {
            SubRecord::Demographic => self.demographic.is_some(),
            SubRecord::Management => self.management.is_some(),
        }
    }

    /// Read a field. `None` when the sub-record is absent or the field
    /// name is unknown.
    pub fn get(&self, field: &FieldRef) -> Option<FieldValue> {
        match field.record {
            SubRecord::Demographic => self.demographic.as_ref()?.get(&field.field),
            SubRecord::Management => self.management.as_ref()?.get(&field.field),
        }
    }

    /// Overwrite a field, returning the previous value, or `Ok(None)` when
    /// the addressed sub-record is absent.
    pub fn set(
        &mut self,
        field: &FieldRef,
        value: FieldValue,
    ) -> Result<Option<FieldValue>, TypeError> {
        match field.record {
            SubRecord::Demographic => match self.demographic.as_mut() {
                Some(d) => d.set(&field.field, value).map(Some),
                None => Ok(None),
            },
            SubRecord::Management => match self.management.as_mut() {
                Some(m) => m.set(&field.field, value).map(Some),
                None => Ok(None),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ParticipantKey {
        ParticipantKey::new(9000000009)
    }

    #[test]
    fn get_and_set_by_name() {
        let mut d = DemographicSnapshot::new(key());
        assert_eq!(d.get("post_code"), Some(FieldValue::Null));
        let old = d.set("post_code", FieldValue::text("LS1 4AP")).unwrap();
        assert_eq!(old, FieldValue::Null);
        assert_eq!(d.post_code.as_deref(), Some("LS1 4AP"));
    }

    #[test]
    fn key_is_readable_not_writable() {
        let mut m = ManagementSnapshot::new(key());
        assert_eq!(m.get("nhs_number"), Some(FieldValue::Int(9000000009)));
        assert_eq!(
            m.set("nhs_number", FieldValue::Int(1)),
            Err(TypeError::ReadOnlyField("nhs_number".into()))
        );
    }

    #[test]
    fn unknown_field_is_rejected() {
        let mut d = DemographicSnapshot::new(key());
        assert!(d.get("shoe_size").is_none());
        assert!(matches!(
            d.set("shoe_size", FieldValue::Int(9)),
            Err(TypeError::UnknownField { record: "demographic", .. })
        ));
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let mut m = ManagementSnapshot::new(key());
        let err = m.set("eligibility_flag", FieldValue::text("yes")).unwrap_err();
        assert_eq!(
            err,
            TypeError::FieldType {
                field: "eligibility_flag".into(),
                expected: "int or null",
                actual: "text",
            }
        );
    }

    #[test]
    fn participant_set_skips_absent_sub_record() {
        let mut p = ParticipantSnapshot::new(key(), Some(DemographicSnapshot::new(key())), None);
        let r = p
            .set(&FieldRef::management("exception_flag"), FieldValue::Int(1))
            .unwrap();
        assert!(r.is_none());
        assert!(p.management.is_none());
        assert!(!p.is_empty());
        assert!(p.get(&FieldRef::management("exception_flag")).is_none());
    }

    #[test]
    fn field_ref_display() {
        assert_eq!(FieldRef::demographic("post_code").to_string(), "demographic.post_code");
    }

    #[test]
    fn field_lists_exclude_key() {
        assert!(!DemographicSnapshot::FIELDS.contains(&"nhs_number"));
        assert!(ManagementSnapshot::FIELDS.contains(&"participant_screening_status"));
    }
}
