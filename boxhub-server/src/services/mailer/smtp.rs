use anyhow::{Context, Result, anyhow};
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::authentication::Credentials,
};

use super::{EmailMessage, MailClient, SmtpConfig};

pub struct SmtpMailClient {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_email: String,
    from_name: String,
}

impl SmtpMailClient {
    pub fn new(smtp: &SmtpConfig, from_email: &str, from_name: &str) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)
            .context("Failed to create SMTP transport")?
            .port(smtp.port);
        if !smtp.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                smtp.username.clone(),
                smtp.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from_email: from_email.to_string(),
            from_name: from_name.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl MailClient for SmtpMailClient {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        let from_address = format!("{} <{}>", self.from_name, self.from_email);

        let email_builder = Message::builder()
            .from(from_address.parse().context("Invalid from address")?)
            .to(message.to.parse().context("Invalid to address")?)
            .subject(&message.subject);

        let email = match (message.body_html, message.body_text) {
            (Some(html), Some(text)) => email_builder.multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html),
                    ),
            )?,
            (Some(html), None) => email_builder.header(ContentType::TEXT_HTML).body(html)?,
            (None, Some(text)) => email_builder.header(ContentType::TEXT_PLAIN).body(text)?,
            (None, None) => return Err(anyhow!("Email must have either HTML or text body")),
        };

        self.transport
            .send(email)
            .await
            .context("Failed to send email via SMTP")?;
        Ok(())
    }
}
