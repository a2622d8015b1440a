use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::repositories::{PasswordResetRequestRepository, UserRepository};
use crate::services::{EmailService, PasswordResetService};

/// アプリケーション共有状態
///
/// axum の State として全ハンドラーで共有される。
/// Clone は必須（axum が内部で clone するため）。
#[derive(Clone)]
pub struct AppState {
    /// パスワードリセットサービス
    pub password_reset_service: PasswordResetService,
}

impl AppState {
    /// PostgreSQL とメール通知を使う AppState を作成
    pub fn new(db_pool: PgPool, config: Config) -> Self {
        let config = Arc::new(config);
        let user_repo = UserRepository::new(db_pool.clone());
        let request_repo = PasswordResetRequestRepository::new(db_pool);
        let email_service = EmailService::new(config.clone());

        let password_reset_service = PasswordResetService::new(
            Arc::new(user_repo),
            Arc::new(request_repo),
            Arc::new(email_service),
            config,
        );

        Self::from_service(password_reset_service)
    }

    /// 構築済みのサービスから AppState を作成
    pub fn from_service(password_reset_service: PasswordResetService) -> Self {
        Self {
            password_reset_service,
        }
    }
}
