use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::{PasswordResetRequest, User};
use crate::repositories::ResetRequestStore;

/// `password_reset_requests` テーブル（user_id が主キー）
#[derive(Clone)]
pub struct PasswordResetRequestRepository {
    pool: PgPool,
}

impl PasswordResetRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResetRequestStore for PasswordResetRequestRepository {
    /// ユーザーのリセットリクエストを検索
    ///
    /// # Note
    /// 有効期限の検証は呼び出し側で行う
    async fn find_by_user(&self, user: &User) -> Result<Option<PasswordResetRequest>, AppError> {
        let request = sqlx::query_as::<_, PasswordResetRequest>(
            r#"
            SELECT user_id, token, expires_at, version
            FROM password_reset_requests
            WHERE user_id = $1
            "#,
        )
        .bind(user.id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(request)
    }

    /// バージョン比較付きで保存
    ///
    /// - version = 0: 行が存在しない場合のみ挿入
    /// - version > 0: 読み込み時と同じバージョンの場合のみ更新
    async fn save(
        &self,
        request: &PasswordResetRequest,
    ) -> Result<PasswordResetRequest, AppError> {
        let (Some(token), Some(expires_at)) = (request.token(), request.expires_at()) else {
            return Err(AppError::Internal(anyhow::anyhow!(
                "reset request must have token and expiration before save"
            )));
        };

        let saved = if request.version() == 0 {
            sqlx::query_as::<_, PasswordResetRequest>(
                r#"
                INSERT INTO password_reset_requests (user_id, token, expires_at, version)
                VALUES ($1, $2, $3, 1)
                ON CONFLICT (user_id) DO NOTHING
                RETURNING user_id, token, expires_at, version
                "#,
            )
            .bind(request.user_id())
            .bind(token)
            .bind(expires_at)
            .fetch_optional(&self.pool)
            .await?
        } else {
            sqlx::query_as::<_, PasswordResetRequest>(
                r#"
                UPDATE password_reset_requests
                SET token = $2, expires_at = $3, version = version + 1
                WHERE user_id = $1 AND version = $4
                RETURNING user_id, token, expires_at, version
                "#,
            )
            .bind(request.user_id())
            .bind(token)
            .bind(expires_at)
            .bind(request.version())
            .fetch_optional(&self.pool)
            .await?
        };

        saved.ok_or_else(|| {
            tracing::warn!(
                user_id = %request.user_id(),
                version = request.version(),
                "リセットリクエスト保存の競合"
            );
            AppError::ResetRequestConflict
        })
    }
}
