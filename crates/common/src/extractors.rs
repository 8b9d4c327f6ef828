//! Custom axum extractors for HelpHub

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize};
use validator::Validate;

use crate::config::{DEFAULT_MESSAGE_PAGE_SIZE, MAX_MESSAGE_PAGE_SIZE};
use crate::Error;

/// Offset pagination parameters for list endpoints
///
/// Raw values are kept signed so that out-of-range input is clamped rather than
/// rejected at deserialization time.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

impl Pagination {
    /// Get the offset, defaulting to 0
    pub fn offset(&self) -> u32 {
        self.offset
            .unwrap_or(0)
            .clamp(0, i64::from(u32::MAX)) as u32
    }

    /// Get the limit, defaulting to 20, capped at 100
    pub fn limit(&self) -> u32 {
        self.limit_or(DEFAULT_MESSAGE_PAGE_SIZE)
    }

    /// Get the limit with a caller-chosen default, capped at 100
    pub fn limit_or(&self, default: u32) -> u32 {
        self.limit
            .unwrap_or(i64::from(default))
            .clamp(1, i64::from(MAX_MESSAGE_PAGE_SIZE)) as u32
    }
}

/// JSON extractor that validates the deserialized value automatically.
///
/// Replaces `Json<T>` + manual `.validate()` calls in handlers.
/// Requires `T: DeserializeOwned + Validate`.
///
/// All input errors (deserialization + validation) return 400.
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

/// Rejection type for `ValidatedJson`:
/// - JSON deserialization errors → 400 (via `Error::Validation`)
/// - Validation errors → 400 (via `Error::Validation`)
#[derive(Debug)]
pub enum ValidatedJsonRejection {
    Json(JsonRejection),
    Validation(Error),
}

impl IntoResponse for ValidatedJsonRejection {
    fn into_response(self) -> Response {
        match self {
            ValidatedJsonRejection::Json(e) => Error::Validation(e.body_text()).into_response(),
            ValidatedJsonRejection::Validation(e) => e.into_response(),
        }
    }
}

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ValidatedJsonRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(ValidatedJsonRejection::Json)?;
        value.validate().map_err(|e| {
            ValidatedJsonRejection::Validation(Error::Validation(format!(
                "Validation failed: {}",
                e
            )))
        })?;
        Ok(ValidatedJson(value))
    }
}
