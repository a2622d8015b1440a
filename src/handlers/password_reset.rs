use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

// === リセットリクエスト ===

#[derive(Debug, Deserialize)]
pub struct ResetRequestRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct ResetRequestResponse {
    pub message: String,
}

/// POST /api/password/reset-request
///
/// # Security
/// - 形式が正しいメールアドレスには常に200を返す（ユーザー存在有無を漏洩しない）
/// - 保存・通知の失敗もログに記録したうえで同じ200を返す
/// - トークンはレスポンスに含めない（通知経由でのみ届ける）
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(request): Json<ResetRequestRequest>,
) -> Result<Json<ResetRequestResponse>, AppError> {
    // バリデーション
    validate_email(&request.email)?;

    // ユーザー不在・保存失敗でもエラーにしない
    if let Err(e) = state
        .password_reset_service
        .create_reset_request(&request.email)
        .await
    {
        tracing::error!(error = %e, "パスワードリセットリクエストの処理に失敗");
    }

    Ok(Json(ResetRequestResponse {
        message: "パスワードリセット手順をメールで送信しました".to_string(),
    }))
}

// === トークン検証 ===

#[derive(Deserialize)]
pub struct VerifyTokenRequest {
    pub email: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyTokenResponse {
    pub valid: bool,
}

/// POST /api/password/reset/verify
///
/// # Security
/// - token はログに出力しない
/// - 失敗理由は区別せず `valid: false` のみ返す
pub async fn verify_password_reset_token(
    State(state): State<AppState>,
    Json(request): Json<VerifyTokenRequest>,
) -> Json<VerifyTokenResponse> {
    let valid = state
        .password_reset_service
        .is_token_valid(&request.email, &request.token)
        .await;

    Json(VerifyTokenResponse { valid })
}

/// メールアドレスのバリデーション
fn validate_email(email: &str) -> Result<(), AppError> {
    if email.trim().is_empty() || !email.contains('@') {
        return Err(AppError::Validation(
            "有効なメールアドレスを入力してください".to_string(),
        ));
    }
    Ok(())
}
