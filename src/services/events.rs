use async_trait::async_trait;

use crate::error::AppError;
use crate::models::PasswordResetRequest;

/// リセットトークン発行イベント
#[derive(Debug, Clone)]
pub struct PasswordResetIssued {
    /// 発行対象ユーザーのメールアドレス
    pub email: String,
    /// 保存済みのリクエスト
    pub request: PasswordResetRequest,
}

/// 発行イベントの通知先
///
/// 保存成功後に同期的に呼び出される。エラーは呼び出し側でログ出力のみ行い、
/// 発行処理自体は失敗させない。
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn notify_issued(&self, event: &PasswordResetIssued) -> Result<(), AppError>;
}

/// 何もしない通知先
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

#[async_trait]
impl EventSink for NoopEventSink {
    async fn notify_issued(&self, _event: &PasswordResetIssued) -> Result<(), AppError> {
        Ok(())
    }
}
