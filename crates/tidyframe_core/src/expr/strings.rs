//! String functions, applied through the skip-null combinator.
use std::fmt;

use regex::Regex;
use tidyframe_error::{ErrorKind, FrameError, Result};

use crate::arrays::array::Array;
use crate::arrays::compute::strings::map_utf8;
use crate::arrays::datatype::DataType;
use crate::arrays::scalar::ScalarValue;

#[derive(Debug, Clone)]
pub enum StringFunction {
    Contains(String),
    StartsWith(String),
    EndsWith(String),
    /// Number of characters.
    Length,
    Upper,
    Lower,
    RegexMatches(Regex),
    /// Capture group of the first match, null if there is no match.
    RegexExtract { regex: Regex, group: usize },
    /// Split on a regex and pick out one part, null if there are fewer parts.
    SplitPart {
        separator: Regex,
        limit: Option<usize>,
        index: usize,
    },
}

pub(crate) fn compile_regex(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| {
        FrameError::with_kind(ErrorKind::InvalidArgument, "Invalid regular expression")
            .with_field("pattern", pattern)
            .with_field("error", e)
    })
}

impl StringFunction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Contains(_) => "contains",
            Self::StartsWith(_) => "starts_with",
            Self::EndsWith(_) => "ends_with",
            Self::Length => "length",
            Self::Upper => "upper",
            Self::Lower => "lower",
            Self::RegexMatches(_) => "regex_matches",
            Self::RegexExtract { .. } => "regex_extract",
            Self::SplitPart { .. } => "split_part",
        }
    }

    pub fn return_type(&self) -> DataType {
        match self {
            Self::Contains(_) | Self::StartsWith(_) | Self::EndsWith(_) | Self::RegexMatches(_) => {
                DataType::Boolean
            }
            Self::Length => DataType::Int64,
            Self::Upper | Self::Lower | Self::RegexExtract { .. } | Self::SplitPart { .. } => {
                DataType::Utf8
            }
        }
    }

    /// Apply to a single non-null string.
    pub fn apply(&self, s: &str) -> Result<ScalarValue> {
        Ok(match self {
            Self::Contains(pat) => s.contains(pat.as_str()).into(),
            Self::StartsWith(pat) => s.starts_with(pat.as_str()).into(),
            Self::EndsWith(pat) => s.ends_with(pat.as_str()).into(),
            Self::Length => {
                let len = i64::try_from(s.chars().count()).map_err(|_| {
                    FrameError::with_kind(ErrorKind::NumericOverflow, "String too long")
                })?;
                len.into()
            }
            Self::Upper => s.to_uppercase().into(),
            Self::Lower => s.to_lowercase().into(),
            Self::RegexMatches(regex) => regex.is_match(s).into(),
            Self::RegexExtract { regex, group } => regex
                .captures(s)
                .and_then(|caps| caps.get(*group))
                .map(|m| m.as_str())
                .into(),
            Self::SplitPart {
                separator,
                limit,
                index,
            } => {
                let part = match limit {
                    Some(limit) => separator.splitn(s, *limit).nth(*index),
                    None => separator.split(s).nth(*index),
                };
                part.into()
            }
        })
    }

    /// Apply to a scalar, null in null out.
    pub fn apply_scalar(&self, value: &ScalarValue) -> Result<ScalarValue> {
        match value {
            ScalarValue::Null => Ok(ScalarValue::Null),
            ScalarValue::Utf8(s) => self.apply(s),
            other => Err(FrameError::type_mismatch("String function on non-string value")
                .with_field("function", self.name())
                .with_field("value", other)),
        }
    }

    /// Apply to every non-null value of a string array.
    pub fn apply_array(&self, array: &Array) -> Result<Array> {
        map_utf8(array, self.return_type(), |s| self.apply(s))
            .map_err(|e| e.with_field("function", self.name()))
    }
}

impl fmt::Display for StringFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_and_split() {
        let names = Array::from_iter([Some("Max Doe"), None, Some("Franz")]);

        let extract = StringFunction::RegexExtract {
            regex: compile_regex(r"^(\w+) (\w+)$").unwrap(),
            group: 2,
        };
        assert_eq!(
            Array::from_iter([Some("Doe"), None, None]),
            extract.apply_array(&names).unwrap()
        );

        let split = StringFunction::SplitPart {
            separator: compile_regex(" ").unwrap(),
            limit: None,
            index: 1,
        };
        assert_eq!(
            Array::from_iter([Some("Doe"), None, None]),
            split.apply_array(&names).unwrap()
        );
    }

    #[test]
    fn split_limit() {
        let split = StringFunction::SplitPart {
            separator: compile_regex(",").unwrap(),
            limit: Some(2),
            index: 1,
        };
        assert_eq!(ScalarValue::from("b,c"), split.apply("a,b,c").unwrap());
    }

    #[test]
    fn predicates_and_case() {
        let arr = Array::from_iter([Some("Alpha"), None]);
        assert_eq!(
            Array::from_iter([Some(true), None]),
            StringFunction::StartsWith("Al".to_string())
                .apply_array(&arr)
                .unwrap()
        );
        assert_eq!(
            Array::from_iter([Some("ALPHA"), None]),
            StringFunction::Upper.apply_array(&arr).unwrap()
        );
        assert_eq!(
            Array::from_iter([Some(5_i64), None]),
            StringFunction::Length.apply_array(&arr).unwrap()
        );
    }

    #[test]
    fn invalid_regex() {
        let err = compile_regex("(").unwrap_err();
        assert_eq!(ErrorKind::InvalidArgument, err.kind());
        assert_eq!(Some("("), err.get_field("pattern"));
    }

    #[test]
    fn non_string_input() {
        let arr = Array::from_iter([1_i64]);
        let err = StringFunction::Lower.apply_array(&arr).unwrap_err();
        assert_eq!(ErrorKind::TypeMismatch, err.kind());
    }
}
