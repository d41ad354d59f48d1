//! 통합 API 에러 응답 타입.
//!
//! 모든 API 엔드포인트에서 일관된 에러 형식을 제공합니다.

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::ValidationErrors;

/// 통합 API 에러 응답.
///
/// # 예시
///
/// ```json
/// {
///   "code": "ASSET_NOT_CONFIGURED",
///   "message": "Asset DOGE is not configured",
///   "timestamp": 1738300800
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// 에러 코드 (예: "VALIDATION_ERROR", "NO_ANALYSIS", "NOT_FOUND")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
    /// 에러 발생 타임스탬프 (Unix timestamp, 선택적)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl ApiErrorResponse {
    /// 기본 에러 생성 (타임스탬프 포함).
    ///
    /// # Example
    ///
    /// ```
    /// use semaforo_api::error::ApiErrorResponse;
    ///
    /// let error = ApiErrorResponse::new("NOT_FOUND", "Trade not found");
    /// ```
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            timestamp: Some(chrono::Utc::now().timestamp()),
        }
    }
}

impl std::fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiErrorResponse {}

// ==================== Result Type Alias ====================

/// API 핸들러 Result 타입 별칭.
///
/// # Example
///
/// ```ignore
/// async fn close_trade(
///     Path(id): Path<String>,
///     State(state): State<Arc<AppState>>,
/// ) -> ApiResult<Json<TradeRecord>> {
///     let record = state
///         .close_trade(&id)
///         .await
///         .ok_or_else(|| not_found("TRADE_NOT_FOUND", format!("Trade {} not found", id)))?;
///
///     Ok(Json(record))
/// }
/// ```
pub type ApiResult<T> = Result<T, (StatusCode, Json<ApiErrorResponse>)>;

// ==================== 생성 헬퍼 ====================

/// 400 Bad Request.
pub fn bad_request(
    code: impl Into<String>,
    message: impl Into<String>,
) -> (StatusCode, Json<ApiErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiErrorResponse::new(code, message)),
    )
}

/// 404 Not Found.
pub fn not_found(
    code: impl Into<String>,
    message: impl Into<String>,
) -> (StatusCode, Json<ApiErrorResponse>) {
    (StatusCode::NOT_FOUND, Json(ApiErrorResponse::new(code, message)))
}

/// 502 Bad Gateway (외부 데이터 소스 실패).
pub fn bad_gateway(
    code: impl Into<String>,
    message: impl Into<String>,
) -> (StatusCode, Json<ApiErrorResponse>) {
    (
        StatusCode::BAD_GATEWAY,
        Json(ApiErrorResponse::new(code, message)),
    )
}

/// `validator` 에러를 400 VALIDATION_ERROR로 변환합니다.
///
/// 필드별 메시지는 `; `로 연결됩니다.
pub fn validation_error(errors: &ValidationErrors) -> (StatusCode, Json<ApiErrorResponse>) {
    let message = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{}: invalid value", field))
            })
        })
        .collect::<Vec<_>>()
        .join("; ");

    bad_request("VALIDATION_ERROR", message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Leverage {
        #[validate(range(min = 1.0, max = 125.0, message = "leverage must be between 1 and 125"))]
        value: f64,
    }

    #[test]
    fn test_api_error_response_new() {
        let error = ApiErrorResponse::new("TEST_ERROR", "Test message");
        assert_eq!(error.code, "TEST_ERROR");
        assert_eq!(error.message, "Test message");
        assert!(error.timestamp.is_some());
    }

    #[test]
    fn test_validation_error_message() {
        let errors = Leverage { value: 500.0 }.validate().unwrap_err();
        let (status, Json(body)) = validation_error(&errors);

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, "VALIDATION_ERROR");
        assert_eq!(body.message, "leverage must be between 1 and 125");
    }
}
