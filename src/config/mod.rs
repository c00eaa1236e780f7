use std::env;
use std::time::Duration;

pub const DEFAULT_UNIVERSITY_DOMAINS: &[&str] = &[
    "edu",
    "ac.in",
    "edu.in",
    "ernet.in",
    "iitd.ac.in",
    "iitb.ac.in",
    "iisc.ac.in",
    "du.ac.in",
    "jnu.ac.in",
    "bhu.ac.in",
];

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub jwt_expiration_secs: u64,
    pub bcrypt_cost: u32,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub university_domains: Vec<String>,
    pub mail_api_url: Option<String>,
    pub mail_api_key: Option<String>,
    pub mail_from: String,
    pub verify_url_base: String,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        let defaults = Config::default();

        // JWT_EXPIRATION is given in hours, e.g. "24h" or "24"
        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.trim_end_matches('h').parse::<u64>().ok())
            .unwrap_or(24);

        let university_domains = match env::var("UNIVERSITY_DOMAINS") {
            Ok(list) => parse_domain_list(&list),
            Err(_) => defaults.university_domains,
        };

        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", defaults.db_max_connections),
            jwt_secret: env::var("JWT_SECRET")?,
            jwt_expiration_secs: jwt_expiration * 3600,
            bcrypt_cost: parse_or("BCRYPT_COST", defaults.bcrypt_cost),
            server_host: env::var("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: parse_or("SERVER_PORT", defaults.server_port),
            api_base_uri: env::var("API_BASE_URI").unwrap_or(defaults.api_base_uri),
            university_domains,
            mail_api_url: env::var("MAIL_API_URL").ok().filter(|v| !v.is_empty()),
            mail_api_key: env::var("MAIL_API_KEY").ok().filter(|v| !v.is_empty()),
            mail_from: env::var("MAIL_FROM").unwrap_or(defaults.mail_from),
            verify_url_base: env::var("VERIFY_URL_BASE").unwrap_or(defaults.verify_url_base),
        })
    }

    pub fn jwt_expiration(&self) -> Duration {
        Duration::from_secs(self.jwt_expiration_secs)
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url.starts_with("memory:")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "memory://".to_string(),
            db_max_connections: 10,
            jwt_secret: "development-secret-change-me".to_string(),
            jwt_expiration_secs: 24 * 3600,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            server_host: "0.0.0.0".to_string(),
            server_port: 8000,
            api_base_uri: "/api".to_string(),
            university_domains: DEFAULT_UNIVERSITY_DOMAINS
                .iter()
                .map(|d| d.to_string())
                .collect(),
            mail_api_url: None,
            mail_api_key: None,
            mail_from: "no-reply@unichat.local".to_string(),
            verify_url_base: "http://localhost:3000/verify-email".to_string(),
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_domain_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|d| d.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|d| !d.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_list_is_trimmed_and_lowercased() {
        let domains = parse_domain_list(" EDU, .ac.in ,,iitd.ac.in");
        assert_eq!(domains, vec!["edu", "ac.in", "iitd.ac.in"]);
    }

    #[test]
    fn default_config_uses_memory_store() {
        let config = Config::default();
        assert!(config.uses_memory_store());
        assert_eq!(config.jwt_expiration(), Duration::from_secs(86400));
        assert_eq!(config.university_domains.len(), DEFAULT_UNIVERSITY_DOMAINS.len());
    }
}
