use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::store::User;

/// Response envelope shared by every route.
///
/// `code` 1 = unauthorized, 2 = application error, 3 = success;
/// `error` mirrors `code != 3`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T = serde_json::Value> {
    pub code: u8,
    pub error: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl Envelope<serde_json::Value> {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            code: 3,
            error: false,
            message: message.into(),
            data: None,
        }
    }

    pub fn failure(code: u8, message: impl Into<String>) -> Self {
        Self {
            code,
            error: true,
            message: message.into(),
            data: None,
        }
    }
}

impl<T> Envelope<T> {
    pub fn success_with(message: impl Into<String>, data: T) -> Self {
        Self {
            code: 3,
            error: false,
            message: message.into(),
            data: Some(data),
        }
    }
}

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for an authenticated password change.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// Request body for starting the OTP reset flow.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Request body for redeeming an OTP.
#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub code: String,
}

/// Request body for the final reset step. The reset token is the proof
/// handed out by a successful OTP verification for the same account.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub new_password: String,
    pub reset_token: String,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: i64,
    pub email: String,
}

/// Listing projection: no credential material leaves the server.
#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub created_at: OffsetDateTime,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_omits_empty_data() {
        let json = serde_json::to_value(Envelope::success("User registered successfully")).unwrap();
        assert_eq!(json["code"], 3);
        assert_eq!(json["error"], false);
        assert!(json.get("data").is_none());
    }

    #[test]
    fn failure_envelope_mirrors_code() {
        let json = serde_json::to_value(Envelope::failure(2, "Email already exists")).unwrap();
        assert_eq!(json["code"], 2);
        assert_eq!(json["error"], true);
        assert_eq!(json["message"], "Email already exists");
    }

    #[test]
    fn user_summary_carries_no_credentials() {
        let summary = UserSummary::from(User {
            id: 1,
            first_name: "John".into(),
            last_name: "Doe".into(),
            email: "john@example.com".into(),
            password_hash: "argon2-hash".into(),
            reset_code: Some("123456".into()),
            created_at: OffsetDateTime::now_utc(),
        });
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("john@example.com"));
        assert!(!json.contains("argon2-hash"));
        assert!(!json.contains("123456"));
    }
}
