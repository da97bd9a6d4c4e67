use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub mail: MailConfig,
}

/// Outbound mail settings. A missing `api_key` disables real sending;
/// the mailer then only logs the message.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_key: Option<String>,
    pub from_email: String,
    pub from_name: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let mail = MailConfig {
            api_key: env::var("BREVO_API_KEY").ok().filter(|k| !k.is_empty()),
            from_email: env::var("FROM_EMAIL")
                .unwrap_or_else(|_| "billing@example.com".to_string()),
            from_name: env::var("FROM_NAME").unwrap_or_else(|_| "Invoicing".to_string()),
        };
        Ok(Self {
            port,
            database_url,
            host,
            mail,
        })
    }
}
