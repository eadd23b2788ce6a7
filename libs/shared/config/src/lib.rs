use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub default_slot_duration_minutes: i32,
    pub bind_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("JWT_SECRET not set, using empty value");
                    String::new()
                }),
            default_slot_duration_minutes: env::var("DEFAULT_SLOT_DURATION_MINUTES")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or_else(|| {
                    warn!("DEFAULT_SLOT_DURATION_MINUTES not set, using 30");
                    30
                }),
            bind_port: env::var("BIND_PORT")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or_else(|| {
                    warn!("BIND_PORT not set, using 3000");
                    3000
                }),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.jwt_secret.is_empty() && self.default_slot_duration_minutes > 0
    }
}
