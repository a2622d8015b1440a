pub mod memory;
pub mod password_reset_request;
pub mod user;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{PasswordResetRequest, User};

pub use memory::{InMemoryResetRequestStore, InMemoryUserDirectory};
pub use password_reset_request::PasswordResetRequestRepository;
pub use user::UserRepository;

/// メールアドレスからユーザーを解決する
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
}

/// ユーザーごとに1件のリセットリクエストを保持する
#[async_trait]
pub trait ResetRequestStore: Send + Sync {
    async fn find_by_user(&self, user: &User) -> Result<Option<PasswordResetRequest>, AppError>;

    /// リクエストを保存（新規なら挿入、既存なら更新）
    ///
    /// # Errors
    /// - 読み込み時から他の書き込みで更新されていた場合: `AppError::ResetRequestConflict`
    ///
    /// # Returns
    /// バージョンを更新した保存済みリクエスト
    async fn save(
        &self,
        request: &PasswordResetRequest,
    ) -> Result<PasswordResetRequest, AppError>;
}
