use serde::Deserialize;
use serde_json::Value;

use crate::error::AppError;

/// Record-store user row. Only the fields the ownership check and the
/// email-code sign-in need.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    #[serde(rename = "Id")]
    pub record_id: i64,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    code: Option<Value>,
}

impl User {
    pub fn from_value(value: Value) -> Result<Self, AppError> {
        serde_json::from_value(value)
            .map_err(|e| AppError::StoreUnavailable(format!("malformed user record: {e}")))
    }

    /// The store keeps the verification code in a numeric column, so leading
    /// zeros are lost on the wire; this restores the zero-padded 6-digit form.
    pub fn verification_code(&self) -> Option<String> {
        match &self.code {
            Some(Value::Number(n)) => n.as_i64().map(|code| format!("{code:06}")),
            Some(Value::String(s)) if !s.trim().is_empty() => {
                Some(format!("{:0>6}", s.trim()))
            }
            _ => None,
        }
    }

    pub fn code_matches(&self, submitted: &str) -> bool {
        self.verification_code()
            .is_some_and(|stored| stored == submitted.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_code_is_zero_padded() {
        let user = User::from_value(json!({"Id": 1, "email": "a@b.c", "code": 12345}))
            .expect("user parses");
        assert_eq!(user.verification_code().as_deref(), Some("012345"));
        assert!(user.code_matches("012345"));
        assert!(!user.code_matches("12345 6"));
    }

    #[test]
    fn string_code_is_zero_padded_too() {
        let user = User::from_value(json!({"Id": 2, "email": "a@b.c", "code": "987"}))
            .expect("user parses");
        assert_eq!(user.verification_code().as_deref(), Some("000987"));
    }

    #[test]
    fn missing_code_never_matches() {
        let user = User::from_value(json!({"Id": 3, "email": "a@b.c"})).expect("user parses");
        assert_eq!(user.verification_code(), None);
        assert!(!user.code_matches("000000"));
    }

    #[test]
    fn submitted_code_is_trimmed() {
        let user = User::from_value(json!({"Id": 4, "email": "a@b.c", "code": 42}))
            .expect("user parses");
        assert!(user.code_matches(" 000042 "));
    }
}
