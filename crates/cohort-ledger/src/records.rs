use chrono::{DateTime, Utc};
use cohort_types::{DistributionId, ParticipantId, ParticipantKey, ParticipantSnapshot, RequestId};
use serde::{Deserialize, Serialize};

/// Business fields of a staged record. Immutable once created.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewDistributionRecord {
    pub nhs_number: ParticipantKey,
    pub participant_id: Option<ParticipantId>,
    pub superseded_nhs_number: Option<i64>,
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
    pub date_of_death: Option<String>,
    pub gender: i64,
    pub address_line_1: Option<String>,
    pub address_line_2: Option<String>,
    pub address_line_3: Option<String>,
    pub address_line_4: Option<String>,
    pub address_line_5: Option<String>,
    pub post_code: Option<String>,
    pub usual_address_from_dt: Option<String>,
    pub reason_for_removal: Option<String>,
    pub reason_for_removal_from_dt: Option<String>,
    pub telephone_number_home: Option<String>,
    pub telephone_number_home_from_dt: Option<String>,
    pub telephone_number_mob: Option<String>,
    pub telephone_number_mob_from_dt: Option<String>,
    pub email_address_home: Option<String>,
    pub email_address_home_from_dt: Option<String>,
    pub preferred_language: Option<String>,
    pub interpreter_required: i64,
}

impl NewDistributionRecord {
    /// Flatten a snapshot into outbound business fields.
    ///
    /// Returns `None` unless both projections are present.
    pub fn from_snapshot(snapshot: &ParticipantSnapshot) -> Option<Self> {
        let d = snapshot.demographic.as_ref()?;
        let m = snapshot.management.as_ref()?;
        Some(Self {
            nhs_number: snapshot.key,
            participant_id: m.participant_id,
            superseded_nhs_number: d.superseded_by_nhs_number,
            primary_care_provider: d.primary_care_provider.clone(),
            primary_care_provider_from_dt: d.primary_care_provider_from_dt.clone(),
            current_posting: d.current_posting.clone(),
            current_posting_from_dt: d.current_posting_from_dt.clone(),
            name_prefix: d.name_prefix.clone(),
            given_name: d.given_name.clone(),
            other_given_name: d.other_given_name.clone(),
            family_name: d.family_name.clone(),
            previous_family_name: d.previous_family_name.clone(),
            date_of_birth: d.date_of_birth.clone(),
            date_of_death: d.date_of_death.clone(),
            gender: d.gender.unwrap_or(0),
            address_line_1: d.address_line_1.clone(),
            address_line_2: d.address_line_2.clone(),
            address_line_3: d.address_line_3.clone(),
            address_line_4: d.address_line_4.clone(),
            address_line_5: d.address_line_5.clone(),
            post_code: d.post_code.clone(),
            usual_address_from_dt: d.usual_address_from_dt.clone(),
            reason_for_removal: m.reason_for_removal.clone(),
            reason_for_removal_from_dt: m.reason_for_removal_from_dt.clone(),
            telephone_number_home: d.telephone_number_home.clone(),
            telephone_number_home_from_dt: d.telephone_number_home_from_dt.clone(),
            telephone_number_mob: d.telephone_number_mob.clone(),
            telephone_number_mob_from_dt: d.telephone_number_mob_from_dt.clone(),
            email_address_home: d.email_address_home.clone(),
            email_address_home_from_dt: d.email_address_home_from_dt.clone(),
            preferred_language: d.preferred_language.clone(),
            interpreter_required: d.interpreter_required.unwrap_or(0),
        })
    }
}

/// A staged record as stored in the ledger.
///
/// `is_extracted` and `request_id` change exactly once, together, when the
/// record is handed off by an extraction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionRecord {
    pub id: DistributionId,
    #[serde(flatten)]
    pub fields: NewDistributionRecord,
    pub is_extracted: bool,
    pub request_id: Option<RequestId>,
    pub record_insert_datetime: DateTime<Utc>,
    pub record_update_datetime: Option<DateTime<Utc>>,
}

impl DistributionRecord {
    pub(crate) fn staged(id: DistributionId, fields: NewDistributionRecord, at: DateTime<Utc>) -> Self {
        Self {
            id,
            fields,
            is_extracted: false,
            request_id: None,
            record_insert_datetime: at,
            record_update_datetime: None,
        }
    }

    pub(crate) fn mark_extracted(&mut self, request_id: RequestId, at: DateTime<Utc>) {
        self.is_extracted = true;
        self.request_id = Some(request_id);
        self.record_update_datetime = Some(at);
    }
}

/// Records handed off under one request id, ordered by id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    pub request_id: RequestId,
    pub records: Vec<DistributionRecord>,
}

impl Extraction {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ids(&self) -> Vec<DistributionId> {
        self.records.iter().map(|r| r.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_types::{DemographicSnapshot, ManagementSnapshot};

    #[test]
    fn from_snapshot_requires_both_projections() {
        let key = ParticipantKey::new(11);
        let mut d = DemographicSnapshot::new(key);
        d.given_name = Some("Ann".into());
        let mut m = ManagementSnapshot::new(key);
        m.participant_id = Some(ParticipantId::new(3));
        m.reason_for_removal = Some("DEA".into());

        assert!(NewDistributionRecord::from_snapshot(&ParticipantSnapshot::new(
            key,
            Some(d.clone()),
            None
        ))
        .is_none());

        let record =
            NewDistributionRecord::from_snapshot(&ParticipantSnapshot::new(key, Some(d), Some(m)))
                .unwrap();
        assert_eq!(record.nhs_number, key);
        assert_eq!(record.participant_id, Some(ParticipantId::new(3)));
        assert_eq!(record.given_name.as_deref(), Some("Ann"));
        assert_eq!(record.reason_for_removal.as_deref(), Some("DEA"));
        assert_eq!(record.gender, 0);
    }

    #[test]
    fn stored_record_flattens_business_fields() {
        let record = DistributionRecord::staged(
            DistributionId::new(1),
            NewDistributionRecord {
                nhs_number: ParticipantKey::new(5),
                post_code: Some("LS14AP".into()),
                ..Default::default()
            },
            Utc::now(),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["post_code"], "LS14AP");
        assert_eq!(json["is_extracted"], false);
        assert!(json["request_id"].is_null());
    }
}
