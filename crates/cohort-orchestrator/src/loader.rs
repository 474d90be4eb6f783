//! Field-by-field mapping of raw cohort rows into projections.

use cohort_types::{
    CohortRecord, DemographicSnapshot, FieldValue, ManagementSnapshot, TypeError,
};

/// Cohort column to demographic field, where the names differ or match.
const DEMOGRAPHIC_COLUMNS: &[(&str, &str)] = &[
    ("superseded_by_nhs_number", "superseded_by_nhs_number"),
    ("primary_care_provider", "primary_care_provider"),
    ("primary_care_effective_from_date", "primary_care_provider_from_dt"),
    ("current_posting", "current_posting"),
    ("current_posting_effective_from_date", "current_posting_from_dt"),
    ("name_prefix", "name_prefix"),
    ("given_name", "given_name"),
    ("other_given_name", "other_given_name"),
    ("family_name", "family_name"),
    ("previous_family_name", "previous_family_name"),
    ("date_of_birth", "date_of_birth"),
    ("gender", "gender"),
    ("address_line_1", "address_line_1"),
    ("address_line_2", "address_line_2"),
    ("address_line_3", "address_line_3"),
    ("address_line_4", "address_line_4"),
    ("address_line_5", "address_line_5"),
    ("postcode", "post_code"),
    ("paf_key", "paf_key"),
    ("address_effective_from_date", "usual_address_from_dt"),
    ("date_of_death", "date_of_death"),
    ("death_status", "death_status"),
    ("home_telephone_number", "telephone_number_home"),
    ("home_telephone_effective_from_date", "telephone_number_home_from_dt"),
    ("mobile_telephone_number", "telephone_number_mob"),
    ("mobile_telephone_effective_from_date", "telephone_number_mob_from_dt"),
    ("email_address", "email_address_home"),
    ("email_address_effective_from_date", "email_address_home_from_dt"),
    ("preferred_language", "preferred_language"),
];

const MANAGEMENT_COLUMNS: &[(&str, &str)] = &[
    ("reason_for_removal", "reason_for_removal"),
    ("reason_for_removal_effective_from_date", "reason_for_removal_from_dt"),
    ("business_rule_version", "business_rule_version"),
    ("next_test_due_date", "next_test_due_date"),
    ("next_test_due_date_calc_method", "next_test_due_date_calc_method"),
    ("participant_screening_status", "participant_screening_status"),
    ("screening_ceased_reason", "screening_ceased_reason"),
    ("is_higher_risk", "is_higher_risk"),
];

/// Flag columns copied as 0/1, defaulting to 0 when absent.
const MANAGEMENT_FLAGS: &[&str] = &["exception_flag", "blocked_flag", "referral_flag"];

const DEFAULT_RECORD_TYPE: &str = "ADD";

/// Projection rows built from one file, plus the rows skipped for lack of
/// a key.
#[derive(Debug)]
pub struct Projected<T> {
    pub rows: Vec<T>,
    pub skipped: usize,
}

/// Map every keyed record with `map`, in file order.
pub fn project<T>(
    records: &[CohortRecord],
    map: impl Fn(&CohortRecord) -> Result<Option<T>, TypeError>,
) -> Result<Projected<T>, TypeError> {
    let mut rows = Vec::with_capacity(records.len());
    let mut skipped = 0;
    for record in records {
        match map(record)? {
            Some(row) => rows.push(row),
            None => skipped += 1,
        }
    }
    Ok(Projected { rows, skipped })
}

/// Demographic projection of a raw record. `None` when the record has no key.
pub fn demographic_from(record: &CohortRecord) -> Result<Option<DemographicSnapshot>, TypeError> {
    let Some(key) = record.key else {
        return Ok(None);
    };
    let mut row = DemographicSnapshot::new(key);
    for (column, field) in DEMOGRAPHIC_COLUMNS {
        copy(record.field(column), field, |f, v| row.set(f, v))?;
    }
    row.interpreter_required = Some(flag(record.field("is_interpreter_required")));
    row.invalid_flag = Some(flag(record.field("invalid_flag")));
    Ok(Some(row))
}

/// Management projection of a raw record. `None` when the record has no key.
pub fn management_from(record: &CohortRecord) -> Result<Option<ManagementSnapshot>, TypeError> {
    let Some(key) = record.key else {
        return Ok(None);
    };
    let mut row = ManagementSnapshot::new(key);
    row.screening_id = i64::try_from(key.value()).ok();
    row.record_type = Some(
        record
            .field("record_type")
            .as_text()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(DEFAULT_RECORD_TYPE)
            .to_string(),
    );
    row.eligibility_flag = Some(flag(record.field("eligibility")));
    for (column, field) in MANAGEMENT_COLUMNS {
        copy(record.field(column), field, |f, v| row.set(f, v))?;
    }
    for field in MANAGEMENT_FLAGS {
        row.set(field, FieldValue::Int(flag(record.field(field))))?;
    }
    row.cohort_update_id = Some(record.id);
    Ok(Some(row))
}

/// Set `field` from a raw value, converting between text and integers when
/// the raw type does not match the field. Null values are left unset.
fn copy(
    value: &FieldValue,
    field: &str,
    mut set: impl FnMut(&str, FieldValue) -> Result<FieldValue, TypeError>,
) -> Result<(), TypeError> {
    if value.is_null() {
        return Ok(());
    }
    let err = match set(field, value.clone()) {
        Ok(_) => return Ok(()),
        Err(err @ TypeError::FieldType { .. }) => err,
        Err(err) => return Err(err),
    };
    let converted = match value {
        FieldValue::Int(i) => FieldValue::text(i.to_string()),
        FieldValue::Bool(b) => FieldValue::Int(i64::from(*b)),
        FieldValue::Text(s) if s.trim().is_empty() => return Ok(()),
        FieldValue::Text(s) => match s.trim().parse::<i64>() {
            Ok(i) => FieldValue::Int(i),
            Err(_) => return Err(err),
        },
        FieldValue::Null => return Ok(()),
    };
    set(field, converted).map(|_| ())
}

/// Truthiness of a raw flag column, as 0 or 1.
fn flag(value: &FieldValue) -> i64 {
    let set = match value {
        FieldValue::Null => false,
        FieldValue::Bool(b) => *b,
        FieldValue::Int(i) => *i != 0,
        FieldValue::Text(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "t" | "y" | "yes"
        ),
    };
    i64::from(set)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use cohort_types::{key_of, FileId, ParticipantKey, RawRecord, RecordId};

    use super::*;

    fn record(id: u64, pairs: &[(&str, FieldValue)]) -> CohortRecord {
        let fields: RawRecord = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        CohortRecord {
            id: RecordId::new(id),
            file_id: FileId::new(1),
            key: key_of(&fields),
            fields,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn demographic_columns_are_renamed() {
        let r = record(
            1,
            &[
                ("nhs_number", FieldValue::Int(9434765919)),
                ("postcode", FieldValue::text("LS1 4AP")),
                ("home_telephone_number", FieldValue::text("0113 496 0000")),
                ("email_address", FieldValue::text("a@example.com")),
                ("gender", FieldValue::Int(2)),
                ("is_interpreter_required", FieldValue::Bool(true)),
            ],
        );
        let d = demographic_from(&r).unwrap().unwrap();
        assert_eq!(d.nhs_number, ParticipantKey::new(9434765919));
        assert_eq!(d.post_code.as_deref(), Some("LS1 4AP"));
        assert_eq!(d.telephone_number_home.as_deref(), Some("0113 496 0000"));
        assert_eq!(d.email_address_home.as_deref(), Some("a@example.com"));
        assert_eq!(d.gender, Some(2));
        assert_eq!(d.interpreter_required, Some(1));
        assert_eq!(d.invalid_flag, Some(0));
        assert!(d.given_name.is_none());
    }

    #[test]
    fn mismatched_types_are_converted() {
        let r = record(
            1,
            &[
                ("nhs_number", FieldValue::text("943 476 5919")),
                ("gender", FieldValue::text("1")),
                ("paf_key", FieldValue::Int(12345)),
                ("death_status", FieldValue::text("")),
            ],
        );
        let d = demographic_from(&r).unwrap().unwrap();
        assert_eq!(d.gender, Some(1));
        assert_eq!(d.paf_key.as_deref(), Some("12345"));
        assert!(d.death_status.is_none());
    }

    #[test]
    fn unconvertible_value_is_an_error() {
        let r = record(
            1,
            &[("nhs_number", FieldValue::Int(5)), ("gender", FieldValue::text("female"))],
        );
        assert!(matches!(
            demographic_from(&r),
            Err(TypeError::FieldType { .. })
        ));
    }

    #[test]
    fn management_defaults_and_flags() {
        let r = record(
            7,
            &[
                ("nhs_number", FieldValue::Int(5)),
                ("eligibility", FieldValue::text("false")),
                ("blocked_flag", FieldValue::Int(1)),
                ("reason_for_removal", FieldValue::text("DEA")),
            ],
        );
        let m = management_from(&r).unwrap().unwrap();
        assert_eq!(m.screening_id, Some(5));
        assert_eq!(m.record_type.as_deref(), Some("ADD"));
        assert_eq!(m.eligibility_flag, Some(0));
        assert_eq!(m.blocked_flag, Some(1));
        assert_eq!(m.exception_flag, Some(0));
        assert_eq!(m.referral_flag, Some(0));
        assert_eq!(m.reason_for_removal.as_deref(), Some("DEA"));
        assert_eq!(m.cohort_update_id, Some(RecordId::new(7)));
        assert!(m.participant_id.is_none());
    }

    #[test]
    fn keyless_records_are_skipped() {
        let records = vec![
            record(1, &[("nhs_number", FieldValue::Int(5))]),
            record(2, &[("given_name", FieldValue::text("Nobody"))]),
            record(3, &[("nhs_number", FieldValue::text(""))]),
        ];
        let projected = project(&records, management_from).unwrap();
        assert_eq!(projected.rows.len(), 1);
        assert_eq!(projected.skipped, 2);
    }
}
