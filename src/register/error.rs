use axum::{
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
};

use crate::register::repo::StoreError;

/// Terminal outcome of a failed registration. Every variant renders as a redirect to the
/// error page; only the status and the `message` indicator differ.
#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error("invalid submission: {0}")]
    Invalid(String),
    #[error("user already exists")]
    Conflict,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for RegisterError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail => RegisterError::Conflict,
            StoreError::Backend(e) => RegisterError::Internal(e),
        }
    }
}

impl RegisterError {
    pub fn status(&self) -> StatusCode {
        match self {
            RegisterError::Invalid(_) => StatusCode::BAD_REQUEST,
            RegisterError::Conflict => StatusCode::CONFLICT,
            RegisterError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn location(&self) -> &'static str {
        match self {
            RegisterError::Invalid(_) => "/error",
            RegisterError::Conflict => "/error?message=userexists",
            RegisterError::Internal(_) => "/error?message=servererror",
        }
    }
}

impl IntoResponse for RegisterError {
    fn into_response(self) -> Response {
        let location = self.location();
        // Browsers ignore Location on 4xx/5xx, so the body navigates on its own.
        let body = format!(
            "<!DOCTYPE html><html><head><meta charset=\"utf-8\">\
             <meta http-equiv=\"refresh\" content=\"0;url={location}\"></head>\
             <body><a href=\"{location}\">Continue</a></body></html>"
        );
        (self.status(), [(header::LOCATION, location)], Html(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    #[test]
    fn store_errors_map_to_outcomes() {
        let conflict = RegisterError::from(StoreError::DuplicateEmail);
        assert_eq!(conflict.status(), StatusCode::CONFLICT);
        assert_eq!(conflict.location(), "/error?message=userexists");

        let internal = RegisterError::from(StoreError::Backend(anyhow::anyhow!("db down")));
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(internal.location(), "/error?message=servererror");
    }

    #[tokio::test]
    async fn response_never_carries_error_detail() {
        let res = RegisterError::Internal(anyhow::anyhow!("password=hunter2")).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            res.headers().get(header::LOCATION).unwrap(),
            "/error?message=servererror"
        );
        assert!(res.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/html"));

        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains(r#"<meta http-equiv="refresh" content="0;url=/error?message=servererror">"#));
        assert!(body.contains(r#"<a href="/error?message=servererror">"#));
        assert!(!body.contains("hunter2"));
    }

    #[tokio::test]
    async fn invalid_response_links_to_plain_error_page() {
        let res = RegisterError::Invalid("name is required".into()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains(r#"content="0;url=/error""#));
        assert!(!body.contains("name is required"));
    }
}
