use std::fmt;

use sqlx::FromRow;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::error::AppError;
use crate::services::token::{TokenGenerator, constant_time_eq};

/// パスワードリセットリクエスト
///
/// ユーザーごとに最大1件。期限切れになっても削除せず、
/// 次回の発行時に新しいトークンで上書きして再利用する。
#[derive(Clone, PartialEq, Eq, FromRow)]
pub struct PasswordResetRequest {
    user_id: Uuid,
    token: Option<String>,
    expires_at: Option<OffsetDateTime>,
    /// 楽観的排他制御用のバージョン（0 = 未保存）
    version: i64,
}

impl PasswordResetRequest {
    /// 未保存のリクエストを作成（トークン・有効期限は未設定）
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            token: None,
            expires_at: None,
            version: 0,
        }
    }

    /// トークンと有効期限を指定して未保存のリクエストを作成
    pub fn with_token(user_id: Uuid, token: impl Into<String>, expires_at: OffsetDateTime) -> Self {
        Self {
            user_id,
            token: Some(token.into()),
            expires_at: Some(expires_at),
            version: 0,
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        self.expires_at
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    /// 保存後のバージョンを持つコピーを返す（ストア実装用）
    pub fn with_version(&self, version: i64) -> Self {
        Self {
            version,
            ..self.clone()
        }
    }

    /// 期限切れ判定
    ///
    /// 有効期限が未設定（新規作成直後）の場合も期限切れとみなす。
    /// 発行時の再利用判定と検証時の判定はこの関数のみを使うこと。
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        match self.expires_at {
            Some(expires_at) => now >= expires_at,
            None => true,
        }
    }

    /// トークンを発行または延長
    ///
    /// 期限切れの場合のみトークンを再生成し、有効期限は常に `now + validity` に更新する。
    ///
    /// # Returns
    /// トークンを再生成した場合は true
    ///
    /// # Errors
    /// 有効期限が表現可能な範囲を超える場合（リクエストは変更しない）
    pub fn refresh(
        &mut self,
        now: OffsetDateTime,
        validity: Duration,
        tokens: &dyn TokenGenerator,
    ) -> Result<bool, AppError> {
        let expires_at = now.checked_add(validity).ok_or_else(|| {
            tracing::error!(
                validity_secs = validity.whole_seconds(),
                "有効期限の計算がオーバーフロー"
            );
            AppError::Internal(anyhow::anyhow!("token expiration out of range"))
        })?;

        let regenerate = self.is_expired(now);
        if regenerate {
            self.token = Some(tokens.generate());
        }
        self.expires_at = Some(expires_at);
        Ok(regenerate)
    }

    /// 提示されたトークンを受け入れるか判定
    ///
    /// # Security
    /// 期限切れでもトークン比較は必ず実行する（短絡評価しない）
    pub fn accepts(&self, presented: &str, now: OffsetDateTime) -> bool {
        let stored = self.token.as_deref().unwrap_or_default();
        let matches = constant_time_eq(stored.as_bytes(), presented.as_bytes());
        !self.is_expired(now) & matches
    }
}

impl fmt::Debug for PasswordResetRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordResetRequest")
            .field("user_id", &self.user_id)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .field("version", &self.version)
            .finish()
    }
}
