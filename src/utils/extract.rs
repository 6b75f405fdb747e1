use crate::error::AppError;
use axum::{
    async_trait,
    body::{Bytes, HttpBody},
    extract::FromRequest,
    http::Request,
    BoxError, Json,
};
use serde::de::DeserializeOwned;

/// JSON 请求体提取器
///
/// 与 `Json` 相同，但格式错误、字段缺失、未知字段或非法枚举值
/// 统一以 `ValidationError`（400）返回。
#[derive(Debug, Clone, Copy, Default)]
pub struct AppJson<T>(pub T);

#[async_trait]
impl<S, B, T> FromRequest<S, B> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
    B: HttpBody + Send + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    type Rejection = AppError;

    async fn from_request(request: Request<B>, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(request, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;
        Ok(AppJson(value))
    }
}

/// 可省略的 JSON 请求体
///
/// 空请求体得到 `None`；非空请求体必须能解析为 `T`，
/// 否则返回 `ValidationError`，不会被静默忽略。
#[derive(Debug, Clone, Default)]
pub struct OptionalAppJson<T>(pub Option<T>);

#[async_trait]
impl<S, B, T> FromRequest<S, B> for OptionalAppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
    B: HttpBody + Send + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    type Rejection = AppError;

    async fn from_request(request: Request<B>, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(request, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(OptionalAppJson(None));
        }

        let value = serde_json::from_slice::<T>(&bytes)
            .map_err(|e| AppError::Validation(format!("Failed to deserialize the JSON body: {}", e)))?;
        Ok(OptionalAppJson(Some(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::milestone::ReviewRequest;
    use axum::body::Body;

    async fn extract(body: &'static str) -> Result<OptionalAppJson<ReviewRequest>, AppError> {
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from(body))
            .unwrap();
        OptionalAppJson::<ReviewRequest>::from_request(request, &()).await
    }

    #[tokio::test]
    async fn test_empty_body_is_none() {
        let OptionalAppJson(value) = extract("").await.unwrap();
        assert!(value.is_none());

        let OptionalAppJson(value) = extract("  \n").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_body_without_content_type_is_parsed() {
        let OptionalAppJson(value) = extract(r#"{"feedback":"Nice work"}"#).await.unwrap();
        assert_eq!(value.unwrap().feedback.as_deref(), Some("Nice work"));
    }

    #[tokio::test]
    async fn test_unknown_field_is_rejected() {
        let result = extract(r#"{"feedbak":"Nice work"}"#).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result = extract("not json").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
