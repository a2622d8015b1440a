use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::TokenValidity;
use crate::error::AppError;
use crate::models::{PasswordResetRequest, User};
use crate::repositories::{ResetRequestStore, UserDirectory};
use crate::services::clock::{Clock, SystemClock};
use crate::services::events::{EventSink, PasswordResetIssued};
use crate::services::token::{AlphanumericTokenGenerator, TokenGenerator};

type LockTable = HashMap<Uuid, Arc<Mutex<()>>>;

/// 保存競合時の最大試行回数
const MAX_SAVE_ATTEMPTS: u32 = 3;

/// パスワードリセットサービス
#[derive(Clone)]
pub struct PasswordResetService {
    users: Arc<dyn UserDirectory>,
    requests: Arc<dyn ResetRequestStore>,
    events: Arc<dyn EventSink>,
    validity: Arc<dyn TokenValidity>,
    clock: Arc<dyn Clock>,
    tokens: Arc<dyn TokenGenerator>,
    locks: UserLocks,
}

impl PasswordResetService {
    /// 新しい PasswordResetService を作成
    ///
    /// 時刻はシステム時刻、トークンは OS の乱数源から生成する。
    pub fn new(
        users: Arc<dyn UserDirectory>,
        requests: Arc<dyn ResetRequestStore>,
        events: Arc<dyn EventSink>,
        validity: Arc<dyn TokenValidity>,
    ) -> Self {
        Self {
            users,
            requests,
            events,
            validity,
            clock: Arc::new(SystemClock),
            tokens: Arc::new(AlphanumericTokenGenerator),
            locks: UserLocks::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_token_generator(mut self, tokens: Arc<dyn TokenGenerator>) -> Self {
        self.tokens = tokens;
        self
    }

    /// パスワードリセットリクエストを発行
    ///
    /// 有効なリクエストが既にあればトークンを再利用し、有効期限のみ延長する。
    /// 期限切れまたは新規の場合はトークンを生成する。
    ///
    /// # Returns
    /// ユーザーが存在しない場合は `None`（イベントも発行しない）
    ///
    /// # Security
    /// トークン（平文）はログに出力しない
    pub async fn create_reset_request(
        &self,
        email: &str,
    ) -> Result<Option<PasswordResetRequest>, AppError> {
        tracing::info!(email = %email, "パスワードリセットリクエスト");

        let user = match self.users.find_by_email(email).await? {
            Some(u) => u,
            None => {
                tracing::info!(email = %email, "パスワードリセット: ユーザー不在");
                return Ok(None);
            }
        };

        let mut attempt = 1;
        let saved = loop {
            let result = self
                .locks
                .with_lock(user.id, || self.issue_for(&user))
                .await;

            match result {
                Err(AppError::ResetRequestConflict) if attempt < MAX_SAVE_ATTEMPTS => {
                    tracing::warn!(user_id = %user.id, attempt, "保存競合のため再試行");
                    attempt += 1;
                }
                result => break result?,
            }
        };

        // 通知失敗は保存済みのリクエストを取り消さない
        let event = PasswordResetIssued {
            email: user.email.clone(),
            request: saved.clone(),
        };
        if let Err(e) = self.events.notify_issued(&event).await {
            tracing::warn!(error = ?e, user_id = %user.id, "発行イベントの通知に失敗");
        }

        tracing::info!(user_id = %user.id, "パスワードリセットトークン発行完了");

        Ok(Some(saved))
    }

    /// トークンが有効か検証
    ///
    /// # Security
    /// - ユーザー不在・リクエスト不在・期限切れ・不一致はすべて false（区別しない）
    /// - ストアのエラーもログ出力のみで false を返す
    pub async fn is_token_valid(&self, email: &str, token: &str) -> bool {
        match self.check_token(email, token).await {
            Ok(valid) => valid,
            Err(e) => {
                tracing::error!(error = ?e, "トークン検証中のエラー");
                false
            }
        }
    }

    async fn check_token(&self, email: &str, token: &str) -> Result<bool, AppError> {
        let Some(user) = self.users.find_by_email(email).await? else {
            return Ok(false);
        };
        let Some(request) = self.requests.find_by_user(&user).await? else {
            return Ok(false);
        };

        let valid = request.accepts(token, self.clock.now());
        if !valid {
            tracing::warn!(user_id = %user.id, "無効または期限切れのトークン");
        }

        Ok(valid)
    }

    /// 読み込み → 更新 → 保存（ユーザー単位のロック内で実行）
    async fn issue_for(&self, user: &User) -> Result<PasswordResetRequest, AppError> {
        let mut request = self
            .requests
            .find_by_user(user)
            .await?
            .unwrap_or_else(|| PasswordResetRequest::new(user.id));

        let now = self.clock.now();
        let regenerated = request.refresh(
            now,
            self.validity.token_validity_interval(),
            self.tokens.as_ref(),
        )?;

        let saved = self.requests.save(&request).await?;
        tracing::debug!(user_id = %user.id, regenerated, "リセットリクエスト保存");

        Ok(saved)
    }
}

/// ユーザー単位の排他ロック
///
/// 保持・待機しているタスクがいなくなったエントリは解放時に削除する。
/// キャンセルやパニックで処理が中断された場合も `LockEntry` の drop で削除される。
#[derive(Clone, Default)]
struct UserLocks {
    inner: Arc<StdMutex<LockTable>>,
}

impl UserLocks {
    async fn with_lock<F, Fut, T>(&self, user_id: Uuid, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let entry = LockEntry::acquire(&self.inner, user_id);
        let _guard = entry.lock.lock().await;
        f().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        lock_table(&self.inner).len()
    }
}

/// ロックテーブル上のエントリへの参照
///
/// 参照の複製・破棄はすべてテーブルのロック内で行う。
struct LockEntry<'a> {
    table: &'a StdMutex<LockTable>,
    user_id: Uuid,
    lock: Arc<Mutex<()>>,
}

impl<'a> LockEntry<'a> {
    fn acquire(table: &'a StdMutex<LockTable>, user_id: Uuid) -> Self {
        let lock = lock_table(table).entry(user_id).or_default().clone();
        Self {
            table,
            user_id,
            lock,
        }
    }
}

impl Drop for LockEntry<'_> {
    fn drop(&mut self) {
        let mut locks = lock_table(self.table);
        drop(std::mem::take(&mut self.lock));
        if locks
            .get(&self.user_id)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(&self.user_id);
        }
    }
}

/// テーブルは await をまたいで保持しないため、ポイズンしても中身はそのまま使う
fn lock_table(table: &StdMutex<LockTable>) -> MutexGuard<'_, LockTable> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}
