use cohort_types::{FieldRef, FieldValue, ParticipantSnapshot};
use serde::{Deserialize, Serialize};

/// Declarative predicate over a working copy.
///
/// A field comparison against an absent sub-record is always false, so a
/// rule never fires on a projection the participant does not have.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Condition {
    /// Field is null or whitespace-only text.
    FieldIsBlank { field: FieldRef },
    FieldEquals { field: FieldRef, value: FieldValue },
    FieldNotEquals { field: FieldRef, value: FieldValue },
    /// Every inner condition holds. Empty is true.
    All { conditions: Vec<Condition> },
    /// At least one inner condition holds. Empty is false.
    Any { conditions: Vec<Condition> },
    Not { condition: Box<Condition> },
}

impl Condition {
    pub fn is_blank(field: FieldRef) -> Self {
        Self::FieldIsBlank { field }
    }

    pub fn equals(field: FieldRef, value: impl Into<FieldValue>) -> Self {
        Self::FieldEquals {
            field,
            value: value.into(),
        }
    }

    pub fn not_equals(field: FieldRef, value: impl Into<FieldValue>) -> Self {
        Self::FieldNotEquals {
            field,
            value: value.into(),
        }
    }

    pub fn evaluate(&self, working: &ParticipantSnapshot) -> bool {
        match self {
            Self::FieldIsBlank { field } => working.get(field).is_some_and(|v| v.is_blank()),
            Self::FieldEquals { field, value } => working.get(field).is_some_and(|v| v == *value),
            Self::FieldNotEquals { field, value } => {
                working.get(field).is_some_and(|v| v != *value)
            }
            Self::All { conditions } => conditions.iter().all(|c| c.evaluate(working)),
            Self::Any { conditions } => conditions.iter().any(|c| c.evaluate(working)),
            Self::Not { condition } => !condition.evaluate(working),
        }
    }

    /// Every field the condition reads, depth first.
    pub fn fields(&self) -> Vec<&FieldRef> {
        match self {
            Self::FieldIsBlank { field }
            | Self::FieldEquals { field, .. }
            | Self::FieldNotEquals { field, .. } => vec![field],
            Self::All { conditions } | Self::Any { conditions } => {
                conditions.iter().flat_map(Condition::fields).collect()
            }
            Self::Not { condition } => condition.fields(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_types::{DemographicSnapshot, ManagementSnapshot, ParticipantKey};

    fn working() -> ParticipantSnapshot {
        let key = ParticipantKey::new(7);
        let mut m = ManagementSnapshot::new(key);
        m.eligibility_flag = Some(0);
        ParticipantSnapshot::new(key, Some(DemographicSnapshot::new(key)), Some(m))
    }

    #[test]
    fn blank_and_equality() {
        let w = working();
        assert!(Condition::is_blank(FieldRef::demographic("post_code")).evaluate(&w));
        assert!(Condition::equals(FieldRef::management("eligibility_flag"), 0i64).evaluate(&w));
        assert!(!Condition::equals(FieldRef::management("eligibility_flag"), 1i64).evaluate(&w));
        assert!(Condition::not_equals(FieldRef::management("eligibility_flag"), 1i64).evaluate(&w));
    }

    #[test]
    fn absent_sub_record_never_matches() {
        let key = ParticipantKey::new(7);
        let w = ParticipantSnapshot::new(key, None, None);
        assert!(!Condition::is_blank(FieldRef::demographic("post_code")).evaluate(&w));
        assert!(!Condition::not_equals(FieldRef::management("blocked_flag"), 1i64).evaluate(&w));
    }

    #[test]
    fn combinators() {
        let w = working();
        let blank = Condition::is_blank(FieldRef::demographic("post_code"));
        let never = Condition::equals(FieldRef::management("blocked_flag"), 1i64);
        assert!(Condition::All { conditions: vec![] }.evaluate(&w));
        assert!(!Condition::Any { conditions: vec![] }.evaluate(&w));
        assert!(Condition::Any {
            conditions: vec![never.clone(), blank.clone()]
        }
        .evaluate(&w));
        assert!(!Condition::All {
            conditions: vec![never.clone(), blank]
        }
        .evaluate(&w));
        assert!(Condition::Not {
            condition: Box::new(never)
        }
        .evaluate(&w));
    }

    #[test]
    fn json_shape() {
        let json = r#"{"op":"field_equals","field":{"record":"management","field":"blocked_flag"},"value":1}"#;
        let c: Condition = serde_json::from_str(json).unwrap();
        assert_eq!(c, Condition::equals(FieldRef::management("blocked_flag"), 1i64));
        assert_eq!(c.fields().len(), 1);
    }
}
