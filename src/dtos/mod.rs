use crate::error::AppError;
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct UsrnQuery {
    #[validate(length(min = 1, max = 20, message = "usrn must be between 1 and 20 characters"))]
    pub usrn: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LlmQuery {
    #[validate(length(min = 1, max = 20, message = "usrn must be between 1 and 20 characters"))]
    pub usrn: String,
    /// When present, the narrative is returned as MP3 audio in this voice.
    pub voice: Option<Voice>,
}

/// USRNs are numeric identifiers; anything else is rejected up front.
pub fn require_numeric_usrn(usrn: &str) -> Result<(), AppError> {
    if usrn.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(AppError::BadRequest(anyhow::anyhow!(
            "usrn must contain only digits"
        )))
    }
}

/// Voices supported by the speech endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    Alloy,
    Ash,
    Ballad,
    Coral,
    Echo,
    Fable,
    Nova,
    Onyx,
    Sage,
    Shimmer,
}

impl Voice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Voice::Alloy => "alloy",
            Voice::Ash => "ash",
            Voice::Ballad => "ballad",
            Voice::Coral => "coral",
            Voice::Echo => "echo",
            Voice::Fable => "fable",
            Voice::Nova => "nova",
            Voice::Onyx => "onyx",
            Voice::Sage => "sage",
            Voice::Shimmer => "shimmer",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_usrns_pass() {
        assert!(require_numeric_usrn("12345678").is_ok());
    }

    #[test]
    fn non_numeric_usrns_are_bad_requests() {
        assert!(matches!(
            require_numeric_usrn("12345678; DROP TABLE"),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            require_numeric_usrn("abc"),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn empty_usrn_fails_validation() {
        let query = UsrnQuery {
            usrn: String::new(),
        };
        assert!(query.validate().is_err());
    }

    #[test]
    fn voices_deserialize_lowercase() {
        let query: LlmQuery =
            serde_json::from_value(serde_json::json!({"usrn": "1", "voice": "coral"})).unwrap();
        assert_eq!(query.voice, Some(Voice::Coral));
        assert_eq!(Voice::Coral.as_str(), "coral");
    }

    #[test]
    fn unknown_voice_is_rejected() {
        let query: Result<LlmQuery, _> =
            serde_json::from_value(serde_json::json!({"usrn": "1", "voice": "baritone"}));
        assert!(query.is_err());
    }
}
