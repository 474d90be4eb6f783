use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::identity::{FileId, ParticipantKey, RecordId};

/// Fixed, strictly forward-advancing processing stages.
///
/// Declaration order is the processing order; `Ord` follows it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    CohortLoading,
    DemographicsLoading,
    ParticipantManagementLoading,
    Validation,
    Transformation,
    DistributionLoading,
    Complete,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::CohortLoading,
        Stage::DemographicsLoading,
        Stage::ParticipantManagementLoading,
        Stage::Validation,
        Stage::Transformation,
        Stage::DistributionLoading,
        Stage::Complete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CohortLoading => "cohort_loading",
            Self::DemographicsLoading => "demographics_loading",
            Self::ParticipantManagementLoading => "participant_management_loading",
            Self::Validation => "validation",
            Self::Transformation => "transformation",
            Self::DistributionLoading => "distribution_loading",
            Self::Complete => "complete",
        }
    }

    /// The stage after this one. `Complete` is terminal.
    pub fn next(&self) -> Stage {
        match self {
            Self::CohortLoading => Self::DemographicsLoading,
            Self::DemographicsLoading => Self::ParticipantManagementLoading,
            Self::ParticipantManagementLoading => Self::Validation,
            Self::Validation => Self::Transformation,
            Self::Transformation => Self::DistributionLoading,
            Self::DistributionLoading | Self::Complete => Self::Complete,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| TypeError::UnknownStage(s.to_string()))
    }
}

/// First flag (by name) that went from `true` back to `false`.
fn reverted_flag(flags: &[(&'static str, bool, bool)]) -> Option<&'static str> {
    flags
        .iter()
        .find(|(_, before, after)| *before && !*after)
        .map(|(name, _, _)| *name)
}

/// Processing ledger row for one ingested file.
///
/// Created when the file load starts and only ever moved forward: stage
/// flags go from `false` to `true`, never back, and the row is never
/// deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStatus {
    pub file_id: FileId,
    pub filename: String,
    pub current_stage: Stage,
    pub is_complete: bool,
    pub has_errors: bool,
    pub total_records: u64,
    pub records_passed: u64,
    pub records_failed: u64,
    pub records_distributed: u64,
    pub cohort_loaded: bool,
    pub demographics_loaded: bool,
    pub participant_management_loaded: bool,
    pub validation_complete: bool,
    pub transformation_complete: bool,
    pub distribution_loaded: bool,
    pub stage_completed_at: BTreeMap<Stage, DateTime<Utc>>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
}

impl FileStatus {
    pub fn new(file_id: FileId, filename: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            file_id,
            filename: filename.into(),
            current_stage: Stage::CohortLoading,
            is_complete: false,
            has_errors: false,
            total_records: 0,
            records_passed: 0,
            records_failed: 0,
            records_distributed: 0,
            cohort_loaded: false,
            demographics_loaded: false,
            participant_management_loaded: false,
            validation_complete: false,
            transformation_complete: false,
            distribution_loaded: false,
            stage_completed_at: BTreeMap::new(),
            started_at: at,
            completed_at: None,
            last_updated: at,
        }
    }

    fn flag_mut(&mut self, stage: Stage) -> Option<&mut bool> {
        match stage {
            Stage::CohortLoading => Some(&mut self.cohort_loaded),
            Stage::DemographicsLoading => Some(&mut self.demographics_loaded),
            Stage::ParticipantManagementLoading => Some(&mut self.participant_management_loaded),
            Stage::Validation => Some(&mut self.validation_complete),
            Stage::Transformation => Some(&mut self.transformation_complete),
            Stage::DistributionLoading => Some(&mut self.distribution_loaded),
            Stage::Complete => None,
        }
    }

    pub fn is_stage_complete(&self, stage: Stage) -> bool {
        match stage {
            Stage::CohortLoading => self.cohort_loaded,
            Stage::DemographicsLoading => self.demographics_loaded,
            Stage::ParticipantManagementLoading => self.participant_management_loaded,
            Stage::Validation => self.validation_complete,
            Stage::Transformation => self.transformation_complete,
            Stage::DistributionLoading => self.distribution_loaded,
            Stage::Complete => self.is_complete,
        }
    }

    /// Mark `stage` done and advance `current_stage` past it.
    ///
    /// Completing a stage that lies behind the current one is a regression.
    pub fn complete_stage(&mut self, stage: Stage, at: DateTime<Utc>) -> Result<(), TypeError> {
        if stage < self.current_stage {
            return Err(TypeError::StageRegression {
                from: self.current_stage.to_string(),
                to: stage.to_string(),
            });
        }
        if let Some(flag) = self.flag_mut(stage) {
            *flag = true;
        }
        self.stage_completed_at.insert(stage, at);
        self.current_stage = stage.next();
        self.last_updated = at;
        Ok(())
    }

    /// Close the file after its last stage.
    pub fn finish(&mut self, at: DateTime<Utc>) {
        self.current_stage = Stage::Complete;
        self.is_complete = true;
        self.completed_at = Some(at);
        self.last_updated = at;
    }

    pub fn mark_errors(&mut self, at: DateTime<Utc>) {
        self.has_errors = true;
        self.last_updated = at;
    }

    /// Stages whose completion flag is set, in processing order.
    pub fn stages_completed(&self) -> Vec<Stage> {
        Stage::ALL
            .into_iter()
            .filter(|s| *s != Stage::Complete && self.is_stage_complete(*s))
            .collect()
    }

    /// Describe how `self` would move `previous` backwards, if it would.
    pub fn regression_from(&self, previous: &FileStatus) -> Option<String> {
        if self.current_stage < previous.current_stage {
            return Some(format!(
                "current_stage {} -> {}",
                previous.current_stage, self.current_stage
            ));
        }
        reverted_flag(&[
            ("cohort_loaded", previous.cohort_loaded, self.cohort_loaded),
            ("demographics_loaded", previous.demographics_loaded, self.demographics_loaded),
            (
                "participant_management_loaded",
                previous.participant_management_loaded,
                self.participant_management_loaded,
            ),
            ("validation_complete", previous.validation_complete, self.validation_complete),
            (
                "transformation_complete",
                previous.transformation_complete,
                self.transformation_complete,
            ),
            ("distribution_loaded", previous.distribution_loaded, self.distribution_loaded),
            ("is_complete", previous.is_complete, self.is_complete),
            ("has_errors", previous.has_errors, self.has_errors),
        ])
        .map(|flag| format!("{flag} reverted to false"))
    }
}

/// Processing row for one participant within one file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordStatus {
    pub file_id: FileId,
    pub key: ParticipantKey,
    pub cohort_record_id: RecordId,
    pub current_stage: Stage,
    pub is_complete: bool,
    pub demographics_loaded: bool,
    pub participant_management_loaded: bool,
    pub validation_passed: bool,
    pub transformation_applied: bool,
    pub distributed: bool,
    pub has_validation_errors: bool,
    pub has_transformation_errors: bool,
    pub exception_count: u32,
    pub warning_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecordStatus {
    /// A record entering validation, inheriting the file's load flags.
    pub fn entering_validation(
        file: &FileStatus,
        key: ParticipantKey,
        cohort_record_id: RecordId,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            file_id: file.file_id,
            key,
            cohort_record_id,
            current_stage: Stage::Validation,
            is_complete: false,
            demographics_loaded: file.demographics_loaded,
            participant_management_loaded: file.participant_management_loaded,
            validation_passed: false,
            transformation_applied: false,
            distributed: false,
            has_validation_errors: false,
            has_transformation_errors: false,
            exception_count: 0,
            warning_count: 0,
            created_at: at,
            updated_at: at,
        }
    }

    /// Move to `stage`; moving backwards is a regression.
    pub fn advance_to(&mut self, stage: Stage, at: DateTime<Utc>) -> Result<(), TypeError> {
        if stage < self.current_stage {
            return Err(TypeError::StageRegression {
                from: self.current_stage.to_string(),
                to: stage.to_string(),
            });
        }
        self.current_stage = stage;
        self.is_complete = stage == Stage::Complete;
        self.updated_at = at;
        Ok(())
    }

    pub fn regression_from(&self, previous: &RecordStatus) -> Option<String> {
        if self.current_stage < previous.current_stage {
            return Some(format!(
                "current_stage {} -> {}",
                previous.current_stage, self.current_stage
            ));
        }
        reverted_flag(&[
            ("demographics_loaded", previous.demographics_loaded, self.demographics_loaded),
            (
                "participant_management_loaded",
                previous.participant_management_loaded,
                self.participant_management_loaded,
            ),
            ("validation_passed", previous.validation_passed, self.validation_passed),
            (
                "transformation_applied",
                previous.transformation_applied,
                self.transformation_applied,
            ),
            ("distributed", previous.distributed, self.distributed),
            ("is_complete", previous.is_complete, self.is_complete),
            (
                "has_validation_errors",
                previous.has_validation_errors,
                self.has_validation_errors,
            ),
            (
                "has_transformation_errors",
                previous.has_transformation_errors,
                self.has_transformation_errors,
            ),
        ])
        .map(|flag| format!("{flag} reverted to false"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status() -> FileStatus {
        FileStatus::new(FileId::new(1), "cohort.json", Utc::now())
    }

    #[test]
    fn stages_are_ordered() {
        assert!(Stage::CohortLoading < Stage::Validation);
        assert!(Stage::DistributionLoading < Stage::Complete);
        assert_eq!(Stage::Complete.next(), Stage::Complete);
    }

    #[test]
    fn stage_string_roundtrip() {
        for stage in Stage::ALL {
            assert_eq!(stage.as_str().parse::<Stage>().unwrap(), stage);
        }
        let json = serde_json::to_string(&Stage::ParticipantManagementLoading).unwrap();
        assert_eq!(json, "\"participant_management_loading\"");
        assert!("bogus".parse::<Stage>().is_err());
    }

    #[test]
    fn completing_stages_advances() {
        let mut s = status();
        let now = Utc::now();
        s.complete_stage(Stage::CohortLoading, now).unwrap();
        s.complete_stage(Stage::DemographicsLoading, now).unwrap();
        assert_eq!(s.current_stage, Stage::ParticipantManagementLoading);
        assert_eq!(
            s.stages_completed(),
            vec![Stage::CohortLoading, Stage::DemographicsLoading]
        );
        assert!(s.stage_completed_at.contains_key(&Stage::DemographicsLoading));
    }

    #[test]
    fn completing_earlier_stage_is_rejected() {
        let mut s = status();
        let now = Utc::now();
        s.complete_stage(Stage::CohortLoading, now).unwrap();
        s.complete_stage(Stage::DemographicsLoading, now).unwrap();
        let err = s.complete_stage(Stage::CohortLoading, now).unwrap_err();
        assert!(matches!(err, TypeError::StageRegression { .. }));
    }

    #[test]
    fn finish_marks_complete() {
        let mut s = status();
        s.finish(Utc::now());
        assert!(s.is_complete);
        assert_eq!(s.current_stage, Stage::Complete);
        assert!(s.completed_at.is_some());
    }

    #[test]
    fn regression_detection() {
        let mut before = status();
        before.complete_stage(Stage::CohortLoading, Utc::now()).unwrap();
        let mut after = before.clone();
        assert!(after.regression_from(&before).is_none());
        after.cohort_loaded = false;
        assert_eq!(
            after.regression_from(&before).as_deref(),
            Some("cohort_loaded reverted to false")
        );
        let mut behind = before.clone();
        behind.current_stage = Stage::CohortLoading;
        assert!(behind.regression_from(&before).is_some());
    }

    #[test]
    fn record_status_inherits_load_flags() {
        let mut file = status();
        let now = Utc::now();
        file.complete_stage(Stage::CohortLoading, now).unwrap();
        file.complete_stage(Stage::DemographicsLoading, now).unwrap();
        file.complete_stage(Stage::ParticipantManagementLoading, now).unwrap();
        let mut record =
            RecordStatus::entering_validation(&file, ParticipantKey::new(5), RecordId::new(9), now);
        assert!(record.demographics_loaded);
        assert!(record.participant_management_loaded);
        assert_eq!(record.current_stage, Stage::Validation);

        record.advance_to(Stage::Complete, now).unwrap();
        assert!(record.is_complete);
        assert!(record.advance_to(Stage::Validation, now).is_err());
    }

    #[test]
    fn record_regression_detection() {
        let now = Utc::now();
        let file = status();
        let mut before =
            RecordStatus::entering_validation(&file, ParticipantKey::new(5), RecordId::new(1), now);
        before.validation_passed = true;
        let mut after = before.clone();
        after.validation_passed = false;
        assert_eq!(
            after.regression_from(&before).as_deref(),
            Some("validation_passed reverted to false")
        );
    }
}
