//! Built-in rule sets.

use cohort_types::FieldRef;

use crate::condition::Condition;
use crate::rule::{ConditionalRule, FieldUpdate, ReplacementRule};

/// Default conditional rules, in registration order.
pub fn default_conditional_rules() -> Vec<ConditionalRule> {
    vec![
        ConditionalRule::new(
            "set_default_postcode",
            Condition::is_blank(FieldRef::demographic("post_code")),
            vec![FieldUpdate::new(FieldRef::demographic("post_code"), "UNKNOWN")],
        ),
        ConditionalRule::new(
            "set_ceased_status_for_ineligible",
            Condition::equals(FieldRef::management("eligibility_flag"), 0i64),
            vec![
                FieldUpdate::new(FieldRef::management("participant_screening_status"), "CEASED"),
                FieldUpdate::new(FieldRef::management("screening_ceased_reason"), "INELIGIBLE"),
            ],
        ),
        ConditionalRule::new(
            "set_exception_for_blocked",
            Condition::equals(FieldRef::management("blocked_flag"), 1i64),
            vec![FieldUpdate::new(FieldRef::management("exception_flag"), 1i64)],
        ),
    ]
}

/// Default replacement rules, in registration order.
pub fn default_replacement_rules() -> Vec<ReplacementRule> {
    vec![
        ReplacementRule::new(
            "remove_special_chars_from_names",
            &[("'", ""), ("-", " "), (".", "")],
            vec![
                FieldRef::demographic("given_name"),
                FieldRef::demographic("family_name"),
                FieldRef::demographic("other_given_name"),
            ],
        ),
        ReplacementRule::new(
            "normalize_postcodes",
            &[(" ", "")],
            vec![FieldRef::demographic("post_code")],
        ),
        ReplacementRule::new(
            "clean_phone_numbers",
            &[(" ", ""), ("-", ""), ("(", ""), (")", "")],
            vec![
                FieldRef::demographic("telephone_number_home"),
                FieldRef::demographic("telephone_number_mob"),
            ],
        ),
    ]
}
