//! Response envelope shared by every endpoint. Success and error bodies
//! carry the same `message`/`data`/`meta` shape so API clients parse one
//! format regardless of outcome.

use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct Meta {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub total: Option<i64>,
}

impl Meta {
    pub fn new(page: i64, per_page: i64, total: i64) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
            total: Some(total),
        }
    }

    pub fn empty() -> Self {
        Self {
            page: None,
            per_page: None,
            total: None,
        }
    }
}

/// Payload of error responses built by [`ApiResponse::error`].
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorData {
    pub error: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub message: String,
    pub data: Option<T>,
    pub meta: Option<Meta>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T, meta: Option<Meta>) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
            meta,
        }
    }
}

impl ApiResponse<ErrorData> {
    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            data: Some(ErrorData {
                error: message.clone(),
            }),
            message,
            meta: Some(Meta::empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_mirrors_the_message() {
        let resp = ApiResponse::error("Quote already converted");
        assert_eq!(resp.message, "Quote already converted");
        assert_eq!(resp.data.unwrap().error, "Quote already converted");
        assert!(resp.meta.is_some());
    }

    #[test]
    fn success_envelope_keeps_meta_optional() {
        let resp = ApiResponse::success("Ok", 7, None);
        assert_eq!(resp.data, Some(7));
        assert!(resp.meta.is_none());
    }
}
