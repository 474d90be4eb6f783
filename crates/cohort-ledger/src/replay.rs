use crate::error::LedgerError;
use crate::records::{DistributionRecord, Extraction};
use crate::traits::DistributionReader;

/// Checks that replaying a request reproduces its original extraction.
pub struct ReplayVerifier;

impl ReplayVerifier {
    /// Compare a replay of `extraction.request_id` with the extraction
    /// itself: same count, same order, byte-identical canonical JSON.
    ///
    /// An empty extraction has nothing to replay; it verifies when the
    /// reader reports the request as not found.
    pub fn verify<R: DistributionReader + ?Sized>(
        reader: &R,
        extraction: &Extraction,
    ) -> Result<(), LedgerError> {
        let request_id = extraction.request_id;
        let mismatch = |reason: String| LedgerError::ReplayMismatch { request_id, reason };

        let replayed = match reader.replay(request_id) {
            Ok(records) => records,
            Err(LedgerError::RequestNotFound(_)) if extraction.is_empty() => return Ok(()),
            Err(err) => return Err(err),
        };

        if replayed.len() != extraction.len() {
            return Err(mismatch(format!(
                "replayed {} records, extracted {}",
                replayed.len(),
                extraction.len()
            )));
        }
        for (original, replay) in extraction.records.iter().zip(&replayed) {
            if original.id != replay.id {
                return Err(mismatch(format!(
                    "expected record {} at this position, found {}",
                    original.id, replay.id
                )));
            }
            if canonical_bytes(original)? != canonical_bytes(replay)? {
                return Err(mismatch(format!("record {} changed since extraction", original.id)));
            }
        }
        Ok(())
    }
}

/// Canonical JSON encoding of a record. Field order follows the struct
/// definition, so equal records always encode to equal bytes.
pub fn canonical_bytes(record: &DistributionRecord) -> Result<Vec<u8>, LedgerError> {
    serde_json::to_vec(record).map_err(|e| LedgerError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::RwLock;

    use cohort_types::{DistributionId, ParticipantKey, RequestId};

    use super::*;
    use crate::memory::InMemoryDistributionLedger;
    use crate::records::NewDistributionRecord;
    use crate::traits::DistributionWriter;

    fn ledger_with(n: u64) -> InMemoryDistributionLedger {
        let ledger = InMemoryDistributionLedger::new();
        ledger
            .create(
                (1..=n)
                    .map(|i| NewDistributionRecord {
                        nhs_number: ParticipantKey::new(i),
                        ..Default::default()
                    })
                    .collect(),
            )
            .unwrap();
        ledger
    }

    /// Reader returning whatever records it was handed.
    struct FixedReader(RwLock<Vec<DistributionRecord>>);

    impl DistributionReader for FixedReader {
        fn replay(&self, request_id: RequestId) -> Result<Vec<DistributionRecord>, LedgerError> {
            let records = self.0.read().unwrap().clone();
            if records.is_empty() {
                Err(LedgerError::RequestNotFound(request_id))
            } else {
                Ok(records)
            }
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
            Ok(self.0.read().unwrap().clone())
        }
    }

    #[test]
    fn extraction_replays_identically() {
        let ledger = ledger_with(3);
        let first = ledger.extract_new(Some(2)).unwrap();
        let second = ledger.extract_new(None).unwrap();
        ReplayVerifier::verify(&ledger, &first).unwrap();
        ReplayVerifier::verify(&ledger, &second).unwrap();
    }

    #[test]
    fn empty_extraction_verifies() {
        let ledger = ledger_with(0);
        let extraction = ledger.extract_new(None).unwrap();
        ReplayVerifier::verify(&ledger, &extraction).unwrap();
    }

    #[test]
    fn detects_changed_fields() {
        let ledger = ledger_with(2);
        let extraction = ledger.extract_new(None).unwrap();
        let mut tampered = extraction.records.clone();
        tampered[1].fields.post_code = Some("ZZ9 9ZZ".into());

        let err = ReplayVerifier::verify(&FixedReader(RwLock::new(tampered)), &extraction)
            .unwrap_err();
        assert!(matches!(err, LedgerError::ReplayMismatch { .. }));
        assert!(err.to_string().contains("record 2 changed"));
    }

    #[test]
    fn detects_missing_and_reordered_records() {
        let ledger = ledger_with(2);
        let extraction = ledger.extract_new(None).unwrap();

        let short = FixedReader(RwLock::new(extraction.records[..1].to_vec()));
        assert!(ReplayVerifier::verify(&short, &extraction).is_err());

        let mut reversed = extraction.records.clone();
        reversed.reverse();
        let err = ReplayVerifier::verify(&FixedReader(RwLock::new(reversed)), &extraction)
            .unwrap_err();
        assert!(err.to_string().contains("expected record 1"));
    }
}
