use crate::model::UserContext;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
};

/// Axum extractor for UserContext from request headers
///
/// - X-User-Id: user identifier recorded in `created_by` / `updated_by`
/// - X-User-Email: optional
/// - X-User-Name: optional
///
/// Requests without X-User-Id are attributed to the anonymous user.
#[async_trait]
impl<S> FromRequestParts<S> for UserContext
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(user_from_headers(&parts.headers))
    }
}

fn user_from_headers(headers: &HeaderMap) -> UserContext {
    match extract_header_value(headers, "x-user-id") {
        Some(user_id) => UserContext::with_details(
            user_id,
            extract_header_value(headers, "x-user-email"),
            extract_header_value(headers, "x-user-name"),
        ),
        None => UserContext::anonymous(),
    }
}

/// Extract a non-blank header value as string
fn extract_header_value(headers: &HeaderMap, header_name: &str) -> Option<String> {
    headers
        .get(header_name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderName, HeaderValue};

    #[test]
    fn test_user_context_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-user-id"),
            HeaderValue::from_static("planner-7"),
        );
        headers.insert(
            HeaderName::from_static("x-user-email"),
            HeaderValue::from_static("planner@example.com"),
        );

        let user = user_from_headers(&headers);
        assert_eq!(user.user_id, "planner-7");
        assert_eq!(user.user_email, Some("planner@example.com".to_string()));
        assert_eq!(user.user_name, None);
    }

    #[test]
    fn test_missing_or_blank_id_is_anonymous() {
        assert_eq!(user_from_headers(&HeaderMap::new()), UserContext::anonymous());

        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-user-id"),
            HeaderValue::from_static("   "),
        );
        assert_eq!(user_from_headers(&headers).user_id, "anonymous");
    }
}
