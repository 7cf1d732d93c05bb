use anyhow::anyhow;
use chrono_tz::Tz;

#[derive(Clone)]
pub struct AppConfig {
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_redirect_uri: String,
    pub openai_api_key: String,
    pub openai_api_base: Option<String>,
    pub jwt_secret: String,
    pub google_auth_base: String,
    pub google_token_base: String,
    pub google_api_base: String,
    pub calendar_timezone: Tz,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let google_client_id = std::env::var("GOOGLE_CLIENT_ID")
            .map_err(|_| anyhow!("GOOGLE_CLIENT_ID not found"))?;

        let google_client_secret = std::env::var("GOOGLE_CLIENT_SECRET")
            .map_err(|_| anyhow!("GOOGLE_CLIENT_SECRET not found"))?;

        let google_redirect_uri = std::env::var("GOOGLE_REDIRECT_URI")
            .unwrap_or_else(|_| "http://localhost:3000/api/auth/callback".to_string());

        let openai_api_key =
            std::env::var("OPENAI_API_KEY").map_err(|_| anyhow!("OPENAI_API_KEY not found"))?;

        let jwt_secret = std::env::var("JWT_SECRET")
            .unwrap_or_else(|_| "assistente-calendario-secret".to_string());

        let calendar_timezone = match std::env::var("CALENDAR_TIMEZONE") {
            Ok(name) => name
                .parse::<Tz>()
                .map_err(|_| anyhow!("CALENDAR_TIMEZONE is not a valid IANA timezone"))?,
            Err(_) => chrono_tz::America::Sao_Paulo,
        };

        let port = match std::env::var("PORT") {
            Ok(value) => value
                .parse::<u16>()
                .map_err(|_| anyhow!("PORT is not a valid port number"))?,
            Err(_) => 3000,
        };

        Ok(AppConfig {
            google_client_id,
            google_client_secret,
            google_redirect_uri,
            openai_api_key,
            openai_api_base: std::env::var("OPENAI_API_BASE").ok(),
            jwt_secret,
            google_auth_base: std::env::var("GOOGLE_AUTH_BASE")
                .unwrap_or_else(|_| "https://accounts.google.com".to_string()),
            google_token_base: std::env::var("GOOGLE_TOKEN_BASE")
                .unwrap_or_else(|_| "https://oauth2.googleapis.com".to_string()),
            google_api_base: std::env::var("GOOGLE_API_BASE")
                .unwrap_or_else(|_| "https://www.googleapis.com".to_string()),
            calendar_timezone,
            port,
        })
    }
}
