use crate::{error::AppError, services::auth::AuthUser, state::AppState};
use axum::{
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, info};

/// 认证中间件
///
/// 合法的 Bearer 令牌会把 `AuthUser` 写入请求扩展；
/// 缺失或无效时请求继续，由需要身份的处理器拒绝。
pub async fn auth_middleware<B>(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request<B>,
    next: Next<B>,
) -> Result<Response, AppError> {
    if let Some(token) = bearer_token(&headers) {
        match app_state.auth_service.authenticate(token) {
            Ok(user) => {
                debug!("Authenticated user: {} ({})", user.id, user.role);
                request.extensions_mut().insert(user);
            }
            Err(e) => {
                debug!("Bearer token rejected: {}", e);
            }
        }
    }

    Ok(next.run(request).await)
}

/// 请求 ID 中间件
pub async fn request_id_middleware<B>(
    request: Request<B>,
    next: Next<B>,
) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let method = request.method().clone();
    let uri = request.uri().clone();
    let user = request
        .extensions()
        .get::<AuthUser>()
        .map(|u| u.id.clone())
        .unwrap_or_else(|| "anonymous".to_string());

    let start_time = std::time::Instant::now();
    let mut response = next.run(request).await;

    info!(
        request_id = %request_id,
        user = %user,
        "Request completed: {} {} {} - {}ms",
        method,
        uri,
        response.status().as_u16(),
        start_time.elapsed().as_millis()
    );

    if let Ok(value) = request_id.parse() {
        response.headers_mut().insert("x-request-id", value);
    }

    response
}

/// 从 Authorization 头中取出 Bearer 令牌
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert("authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
