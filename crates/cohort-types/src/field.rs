use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// A dynamically typed field value, as carried by raw ingested records and
/// by rule definitions that address snapshot fields by name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Null, or text that is empty after trimming.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Name of the variant, used in type mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Text(_) => "text",
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Conversion between a typed snapshot field and [`FieldValue`].
pub trait FieldType: Sized {
    /// Name of the accepted value type, used in mismatch errors.
    const EXPECTED: &'static str;

    fn to_field_value(&self) -> FieldValue;

    /// Convert back, returning the rejected value on mismatch.
    fn from_field_value(value: FieldValue) -> Result<Self, FieldValue>;
}

impl FieldType for Option<String> {
    const EXPECTED: &'static str = "text or null";

    fn to_field_value(&self) -> FieldValue {
        match self {
            Some(s) => FieldValue::Text(s.clone()),
            None => FieldValue::Null,
        }
    }

    fn from_field_value(value: FieldValue) -> Result<Self, FieldValue> {
        match value {
            FieldValue::Null => Ok(None),
            FieldValue::Text(s) => Ok(Some(s)),
            other => Err(other),
        }
    }
}

impl FieldType for Option<i64> {
    const EXPECTED: &'static str = "int or null";

    fn to_field_value(&self) -> FieldValue {
        match self {
            Some(i) => FieldValue::Int(*i),
            None => FieldValue::Null,
        }
    }

    fn from_field_value(value: FieldValue) -> Result<Self, FieldValue> {
        match value {
            FieldValue::Null => Ok(None),
            FieldValue::Int(i) => Ok(Some(i)),
            other => Err(other),
        }
    }
}

impl FieldType for i64 {
    const EXPECTED: &'static str = "int";

    fn to_field_value(&self) -> FieldValue {
        FieldValue::Int(*self)
    }

    fn from_field_value(value: FieldValue) -> Result<Self, FieldValue> {
        match value {
            FieldValue::Int(i) => Ok(i),
            other => Err(other),
        }
    }
}

/// Replace `slot` with the converted `value`, returning the previous value.
pub(crate) fn assign<T: FieldType>(
    slot: &mut T,
    field: &str,
    value: FieldValue,
) -> Result<FieldValue, TypeError> {
    let next = T::from_field_value(value).map_err(|rejected| TypeError::FieldType {
        field: field.to_string(),
        expected: T::EXPECTED,
        actual: rejected.type_name(),
    })?;
    Ok(std::mem::replace(slot, next).to_field_value())
}

/// Generates by-name `get`/`set` accessors and a `FIELDS` list for a
/// snapshot struct. The key field is readable through `get` but never
/// settable.
macro_rules! field_accessors {
    ($ty:ident, $record:literal, key: $key:ident, { $($field:ident),* $(,)? }) => {
        impl $ty {
            /// Names of the mutable fields, in declaration order.
            pub const FIELDS: &'static [&'static str] = &[$(stringify!($field)),*];

            /// Read a field by name. Returns `None` for unknown names.
            pub fn get(&self, field: &str) -> Option<$crate::field::FieldValue> {
                use $crate::field::FieldType;
                match field {
                    stringify!($key) => Some($crate::field::FieldValue::Int(self.$key.value() as i64)),
                    $(stringify!($field) => Some(self.$field.to_field_value()),)*
                    _ => None,
                }
            }

            /// Overwrite a field by name, returning the previous value.
            pub fn set(
                &mut self,
                field: &str,
                value: $crate::field::FieldValue,
            ) -> Result<$crate::field::FieldValue, $crate::error::TypeError> {
                match field {
                    stringify!($key) => Err($crate::error::TypeError::ReadOnlyField(field.to_string())),
                    $(stringify!($field) => $crate::field::assign(&mut self.$field, field, value),)*
                    _ => Err($crate::error::TypeError::UnknownField {
                        record: $record,
                        field: field.to_string(),
                    }),
                }
            }
        }
    };
}

pub(crate) use field_accessors;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_detection() {
        assert!(FieldValue::Null.is_blank());
        assert!(FieldValue::text("   ").is_blank());
        assert!(!FieldValue::text("AB1 2CD").is_blank());
        assert!(!FieldValue::Int(0).is_blank());
    }

    #[test]
    fn untagged_json_shapes() {
        let values: Vec<FieldValue> =
            serde_json::from_str(r#"[null, true, 7, "seven"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                FieldValue::Null,
                FieldValue::Bool(true),
                FieldValue::Int(7),
                FieldValue::text("seven"),
            ]
        );
    }

    #[test]
    fn option_conversions() {
        let v: FieldValue = Some("x").into();
        assert_eq!(v, FieldValue::text("x"));
        let n: FieldValue = Option::<i64>::None.into();
        assert!(n.is_null());
    }

    #[test]
    fn typed_conversion_rejects_mismatch() {
        let err = <Option<i64>>::from_field_value(FieldValue::text("1")).unwrap_err();
        assert_eq!(err.type_name(), "text");
        assert_eq!(<Option<String>>::from_field_value(FieldValue::Null), Ok(None));
    }
}
