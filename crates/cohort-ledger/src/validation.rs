use std::collections::BTreeMap;

use cohort_types::{DistributionId, RequestId};

use crate::error::LedgerError;
use crate::traits::DistributionReader;

/// Result of a ledger integrity check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntegrityReport {
    pub record_count: usize,
    pub pending: usize,
    pub extracted: usize,
    /// Extracted records per request id.
    pub requests: BTreeMap<RequestId, usize>,
    pub violations: Vec<Violation>,
}

impl IntegrityReport {
    /// Returns `true` if all checks passed.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// A specific integrity violation detected during validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub id: DistributionId,
    pub kind: ViolationKind,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    /// Ids are not strictly increasing in listing order.
    IdOrder,
    /// `is_extracted` and `request_id` disagree.
    ExtractionPair,
    /// Extracted without an update timestamp.
    MissingUpdateTime,
}

/// Ledger integrity validator.
pub struct LedgerValidator;

impl LedgerValidator {
    /// Check every record for the extraction invariants.
    pub fn validate<R: DistributionReader + ?Sized>(
        reader: &R,
    ) -> Result<IntegrityReport, LedgerError> {
        let records = reader.records()?;
        let mut violations = Vec::new();
        let mut requests = BTreeMap::new();
        let mut pending = 0;
        let mut previous: Option<DistributionId> = None;

        for record in &records {
            if previous.is_some_and(|prev| prev >= record.id) {
                violations.push(Violation {
                    id: record.id,
                    kind: ViolationKind::IdOrder,
                    description: format!("record {} listed out of order", record.id),
                });
            }
            previous = Some(record.id);

            match (record.is_extracted, record.request_id) {
                (false, None) => pending += 1,
                (true, Some(request_id)) => {
                    *requests.entry(request_id).or_insert(0) += 1;
                    if record.record_update_datetime.is_none() {
                        violations.push(Violation {
                            id: record.id,
                            kind: ViolationKind::MissingUpdateTime,
                            description: format!("record {} extracted without update time", record.id),
                        });
                    }
                }
                (extracted, request_id) => violations.push(Violation {
                    id: record.id,
                    kind: ViolationKind::ExtractionPair,
                    description: format!(
                        "record {}: is_extracted={extracted} but request_id={request_id:?}",
                        record.id
                    ),
                }),
            }
        }

        Ok(IntegrityReport {
            record_count: records.len(),
            pending,
            extracted: requests.values().sum(),
            requests,
            violations,
        })
    }
}

#[cfg(test)]
mod tests {
    use cohort_types::ParticipantKey;

    use super::*;
    use crate::memory::InMemoryDistributionLedger;
    use crate::records::{DistributionRecord, NewDistributionRecord};
    use crate::traits::DistributionWriter;

    #[test]
    fn healthy_ledger_is_valid() {
        let ledger = InMemoryDistributionLedger::new();
        ledger
            .create(vec![NewDistributionRecord::default(); 5])
            .unwrap();
        let first = ledger.extract_new(Some(2)).unwrap();
        ledger.extract_new(Some(1)).unwrap();

        let report = LedgerValidator::validate(&ledger).unwrap();
        assert!(report.is_valid(), "{:?}", report.violations);
        assert_eq!(report.record_count, 5);
        assert_eq!(report.pending, 2);
        assert_eq!(report.extracted, 3);
        assert_eq!(report.requests.len(), 2);
        assert_eq!(report.requests[&first.request_id], 2);
    }

    struct Listing(Vec<DistributionRecord>);

    impl DistributionReader for Listing {
        fn replay(&self, id: RequestId) -> Result<Vec<DistributionRecord>, LedgerError> {
            Err(LedgerError::RequestNotFound(id))
        }
        fn get(&self, _: DistributionId) -> Result<Option<DistributionRecord>, LedgerError> {
            Ok(None)
        }
        fn pending_count(&self) -> Result<usize, LedgerError> {
            Ok(0)
        }
        fn request_ids(&self) -> Result<Vec<RequestId>, LedgerError> {
            Ok(Vec::new())
        }
        fn records(&self) -> Result<Vec<DistributionRecord>, LedgerError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn reports_broken_extraction_pairs() {
        let ledger = InMemoryDistributionLedger::new();
        ledger
            .create(vec![
                NewDistributionRecord {
                    nhs_number: ParticipantKey::new(1),
                    ..Default::default()
                };
                3
            ])
            .unwrap();
        ledger.extract_new(Some(1)).unwrap();
        let mut records = ledger.records().unwrap();
        records[0].record_update_datetime = None;
        records[1].is_extracted = true;
        records.swap(1, 2);

        let report = LedgerValidator::validate(&Listing(records)).unwrap();
        let kinds: Vec<_> = report.violations.iter().map(|v| v.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ViolationKind::MissingUpdateTime,
                ViolationKind::IdOrder,
                ViolationKind::ExtractionPair
            ]
        );
    }
}
