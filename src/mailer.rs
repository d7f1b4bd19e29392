use anyhow::Context;
use axum::async_trait;

use crate::config::MailConfig;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_otp(&self, recipient: &str, code: &str) -> anyhow::Result<()>;
}

/// Outbound mail relay speaking a Postmark-style JSON API.
#[derive(Clone)]
pub struct HttpMailer {
    http: reqwest::Client,
    base_url: String,
    sender: String,
    server_token: String,
}

const MESSAGE_STREAM: &str = "outbound";
const SERVER_TOKEN_HEADER: &str = "X-Postmark-Server-Token";

impl HttpMailer {
    pub fn new(cfg: &MailConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("build mail relay client")?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            sender: cfg.sender.clone(),
            server_token: cfg.server_token.clone(),
        })
    }
}

#[derive(serde::Serialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text_body: &'a str,
    message_stream: &'a str,
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send_otp(&self, recipient: &str, code: &str) -> anyhow::Result<()> {
        let body_text = format!("Your OTP to change your password is {}", code);
        let request_body = SendEmailRequest {
            from: &self.sender,
            to: recipient,
            subject: "Password Reset OTP",
            text_body: &body_text,
            message_stream: MESSAGE_STREAM,
        };

        self.http
            .post(format!("{}/email", self.base_url))
            .header(SERVER_TOKEN_HEADER, &self.server_token)
            .json(&request_body)
            .send()
            .await
            .context("send OTP email")?
            .error_for_status()
            .context("mail relay rejected OTP email")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_email_request_uses_relay_field_names() {
        let req = SendEmailRequest {
            from: "noreply@biasbusters.app",
            to: "jane@example.com",
            subject: "Password Reset OTP",
            text_body: "Your OTP to change your password is 123456",
            message_stream: MESSAGE_STREAM,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["From"], "noreply@biasbusters.app");
        assert_eq!(json["To"], "jane@example.com");
        assert_eq!(json["TextBody"], "Your OTP to change your password is 123456");
        assert_eq!(json["MessageStream"], "outbound");
    }
}
