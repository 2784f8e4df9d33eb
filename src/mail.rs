use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use lettre::{
    message::Mailbox,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::AppConfig;

pub const TEMPLATE_DELIVERY_CREATED: &str = "creation";
pub const TEMPLATE_DELIVERY_CANCELED: &str = "cancellation";

const DELIVERY_CREATED_BODY: &str = "\
Olá, {{deliveryman}},

Há uma nova encomenda de {{recipient}} aguardando retirada.
Produto: {{product}}

Bom trabalho!
Equipe FastFeet
";

const DELIVERY_CANCELED_BODY: &str = "\
Olá, {{deliveryman}},

A encomenda de {{recipient}} foi cancelada.
Produto: {{product}}
Motivo: {{problem}}

Equipe FastFeet
";

/// A templated notification. The body is rendered from the named template
/// and the key/value context right before sending.
#[derive(Debug, Clone)]
pub struct MailMessage {
    pub to_name: String,
    pub to_address: String,
    pub subject: String,
    pub template: &'static str,
    pub context: Vec<(&'static str, String)>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<()>;
}

pub fn render_template(template: &str, context: &[(&'static str, String)]) -> Result<String> {
    let body = match template {
        TEMPLATE_DELIVERY_CREATED => DELIVERY_CREATED_BODY,
        TEMPLATE_DELIVERY_CANCELED => DELIVERY_CANCELED_BODY,
        other => bail!("unknown mail template: {other}"),
    };
    let mut rendered = body.to_string();
    for (key, value) in context {
        rendered = rendered.replace(&format!("{{{{{key}}}}}"), value);
    }
    Ok(rendered)
}

/// SMTP delivery via lettre. Built when `MAIL_HOST` is configured.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn from_config(config: &AppConfig, host: &str) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .context("failed to configure the SMTP relay")?
            .port(config.smtp_port);
        if let (Some(user), Some(pass)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        let from = config
            .mail_from
            .parse::<Mailbox>()
            .context("MAIL_FROM must be a mailbox like `Name <addr@example.com>`")?;
        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: MailMessage) -> Result<()> {
        let to = Mailbox::new(
            Some(message.to_name.clone()),
            message
                .to_address
                .parse()
                .with_context(|| format!("invalid recipient address {}", message.to_address))?,
        );
        let body = render_template(message.template, &message.context)?;
        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&message.subject)
            .body(body)
            .context("failed to build mail message")?;
        self.transport
            .send(email)
            .await
            .context("failed to send mail")?;
        tracing::info!(
            to = %message.to_address,
            subject = %message.subject,
            template = message.template,
            "mail sent"
        );
        Ok(())
    }
}

/// Fallback used when no SMTP relay is configured: renders the message and
/// writes it to the log instead of sending it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: MailMessage) -> Result<()> {
        let body = render_template(message.template, &message.context)?;
        tracing::info!(
            to = %format!("{} <{}>", message.to_name, message.to_address),
            subject = %message.subject,
            template = message.template,
            body = %body,
            "mail delivery skipped (no relay configured)"
        );
        Ok(())
    }
}
