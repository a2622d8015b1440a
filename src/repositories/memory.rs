//! インメモリ実装
//!
//! テストや単一プロセスでの組み込み用。再起動で内容は失われる。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{PasswordResetRequest, User};
use crate::repositories::{ResetRequestStore, UserDirectory};

/// メールアドレスをキーにしたユーザー一覧
#[derive(Clone, Default)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<HashMap<String, User>>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// ユーザーを登録（同じメールアドレスが存在する場合は既存ユーザーを返す）
    pub async fn add_user(&self, email: &str) -> User {
        let mut users = self.users.write().await;
        users
            .entry(email.to_string())
            .or_insert_with(|| {
                let now = OffsetDateTime::now_utc();
                User {
                    id: Uuid::new_v4(),
                    email: email.to_string(),
                    created_at: now,
                    updated_at: now,
                }
            })
            .clone()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.read().await.get(email).cloned())
    }
}

/// ユーザーIDをキーにしたリセットリクエスト
///
/// 保存時のバージョン比較は PostgreSQL 実装と同じ規則に従う。
#[derive(Clone, Default)]
pub struct InMemoryResetRequestStore {
    requests: Arc<RwLock<HashMap<Uuid, PasswordResetRequest>>>,
}

impl InMemoryResetRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 保存されているリクエスト数
    pub async fn len(&self) -> usize {
        self.requests.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.requests.read().await.is_empty()
    }
}

#[async_trait]
impl ResetRequestStore for InMemoryResetRequestStore {
    async fn find_by_user(&self, user: &User) -> Result<Option<PasswordResetRequest>, AppError> {
        Ok(self.requests.read().await.get(&user.id).cloned())
    }

    async fn save(
        &self,
        request: &PasswordResetRequest,
    ) -> Result<PasswordResetRequest, AppError> {
        let mut requests = self.requests.write().await;

        let current_version = requests
            .get(&request.user_id())
            .map(PasswordResetRequest::version)
            .unwrap_or(0);

        if current_version != request.version() {
            tracing::warn!(
                user_id = %request.user_id(),
                expected = request.version(),
                actual = current_version,
                "リセットリクエスト保存の競合"
            );
            return Err(AppError::ResetRequestConflict);
        }

        let saved = request.with_version(current_version + 1);
        requests.insert(saved.user_id(), saved.clone());

        Ok(saved)
    }
}
