//! Class rosters.
//!
//! Each configured class carries its student list. The front door resolves an
//! s-number to a display name here before calling into the state machine.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::ClassConfig;
use crate::error::{HallPassError, Result};

/// A student on a class roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Student {
    /// Student number as printed on the ID card.
    #[schema(example = "s12345")]
    pub s_number: String,

    /// Full display name.
    #[schema(example = "Alex Rivera")]
    pub name: String,
}

impl ClassConfig {
    /// Look up a student by s-number, ignoring surrounding whitespace.
    #[must_use]
    pub fn find_student(&self, s_number: &str) -> Option<&Student> {
        let wanted = s_number.trim();
        self.students.iter().find(|s| s.s_number.trim() == wanted)
    }

    /// Like [`ClassConfig::find_student`], failing with
    /// [`HallPassError::StudentNotFound`].
    pub fn require_student(&self, s_number: &str) -> Result<&Student> {
        self.find_student(s_number)
            .ok_or_else(|| HallPassError::StudentNotFound {
                class_id: self.id.clone(),
                student_id: s_number.trim().to_string(),
            })
    }
}

/// The first whitespace-separated word of a name, or `""`.
#[must_use]
pub fn first_name(full_name: &str) -> &str {
    full_name.split_whitespace().next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class() -> ClassConfig {
        ClassConfig {
            id: "P3".into(),
            name: "Period 3".into(),
            students: vec![Student {
                s_number: "s12345".into(),
                name: "Alex Rivera".into(),
            }],
        }
    }

    #[test]
    fn test_find_student_trims() {
        let class = class();
        assert_eq!(class.find_student("  s12345 ").unwrap().name, "Alex Rivera");
        assert!(class.find_student("s99999").is_none());
    }

    #[test]
    fn test_require_student_reports_class() {
        let err = class().require_student("s0").unwrap_err();
        assert!(matches!(
            err,
            HallPassError::StudentNotFound { ref class_id, .. } if class_id == "P3"
        ));
    }

    #[test]
    fn test_first_name() {
        assert_eq!(first_name("Alex Rivera"), "Alex");
        assert_eq!(first_name("  Sam  "), "Sam");
        assert_eq!(first_name(""), "");
    }
}
