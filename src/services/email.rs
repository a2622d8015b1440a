use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::AppError;
use crate::services::events::{EventSink, PasswordResetIssued};

const DEFAULT_RESET_URL_BASE: &str = "http://localhost:3000/password-reset";
const REDACTED_TOKEN: &str = "[REDACTED]";
const RESET_MAIL_SUBJECT: &str = "パスワードリセットのご案内";

/// メール送信サービス
///
/// `email` feature かつ SMTP 設定が揃っている場合のみ実際に送信し、
/// それ以外はログ出力のみ行う（開発モード）。
#[derive(Clone)]
pub struct EmailService {
    config: Arc<Config>,
}

impl EmailService {
    /// 新しい EmailService を作成
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// パスワードリセットメールを送信
    ///
    /// # Security
    /// トークンを含むURLはログに出力しない
    pub async fn send_password_reset_email(&self, to: &str, token: &str) -> Result<(), AppError> {
        #[cfg(feature = "email")]
        {
            if self.smtp_configured() {
                let reset_url = self.build_reset_url(to, token);
                return self.send_via_smtp(to, &reset_url).await;
            }
        }

        // 開発モード: メール送信せずログ出力のみ
        tracing::info!(
            to = %to,
            smtp_configured = self.smtp_configured(),
            reset_url = %self.redacted_reset_url(to),
            "パスワードリセットメール送信（開発モード）"
        );

        Ok(())
    }

    /// ログ出力用のリセットURL（トークン部分を伏せる）
    fn redacted_reset_url(&self, email: &str) -> String {
        self.build_reset_url(email, REDACTED_TOKEN)
    }

    /// リセットURLを構築
    pub fn build_reset_url(&self, email: &str, token: &str) -> String {
        let base = self
            .config
            .password_reset_url_base
            .as_deref()
            .unwrap_or(DEFAULT_RESET_URL_BASE);
        format!(
            "{}?email={}&token={}",
            base,
            urlencoding::encode(email),
            token
        )
    }

    fn smtp_configured(&self) -> bool {
        self.config.smtp_host.is_some()
            && self.config.smtp_username.is_some()
            && self.config.smtp_password.is_some()
            && self.config.smtp_from_address.is_some()
    }

    #[cfg(feature = "email")]
    async fn send_via_smtp(&self, to: &str, reset_url: &str) -> Result<(), AppError> {
        use lettre::message::{Mailbox, header::ContentType};
        use lettre::transport::smtp::authentication::Credentials;
        use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
        use secrecy::ExposeSecret;

        let (Some(host), Some(username), Some(password), Some(from)) = (
            self.config.smtp_host.as_deref(),
            self.config.smtp_username.as_ref(),
            self.config.smtp_password.as_ref(),
            self.config.smtp_from_address.as_deref(),
        ) else {
            return Err(AppError::Mail("SMTP設定が不足しています".to_string()));
        };

        let from: Mailbox = from
            .parse()
            .map_err(|e| AppError::Mail(format!("invalid from address: {}", e)))?;
        let to_mailbox: Mailbox = to
            .parse()
            .map_err(|e| AppError::Mail(format!("invalid recipient address: {}", e)))?;

        let message = Message::builder()
            .from(from)
            .to(to_mailbox)
            .subject(RESET_MAIL_SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(format!(
                "以下のリンクからパスワードを再設定してください。\n\n{}\n",
                reset_url
            ))
            .map_err(|e| AppError::Mail(format!("message build error: {}", e)))?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| AppError::Mail(format!("smtp relay error: {}", e)))?
            .port(self.config.smtp_port)
            .credentials(Credentials::new(
                username.expose_secret().clone(),
                password.expose_secret().clone(),
            ))
            .build();

        mailer
            .send(message)
            .await
            .map_err(|e| AppError::Mail(format!("smtp send error: {}", e)))?;

        tracing::info!(to = %to, "パスワードリセットメール送信完了");

        Ok(())
    }
}

#[async_trait]
impl EventSink for EmailService {
    async fn notify_issued(&self, event: &PasswordResetIssued) -> Result<(), AppError> {
        let token = event.request.token().ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("issued request has no token"))
        })?;

        self.send_password_reset_email(&event.email, token).await
    }
}
