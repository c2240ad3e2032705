use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Server Args ---
    /// Host address and port for the HTTP API to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "0.0.0.0:8000")]
    pub server_addr: String,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,

    /// Maximum /chat requests per second accepted across all users. 0 disables the limiter.
    #[arg(long, env = "CHAT_RATE_LIMIT", default_value = "20")]
    pub chat_rate_limit: u32,

    // --- Gemini (multi-model) Args ---
    /// API key for Google Gemini. Empty disables the Gemini engine.
    #[arg(long, env = "GEMINI_API_KEY", default_value = "")]
    pub gemini_api_key: String,

    /// Comma separated Gemini models, tried in order until one answers.
    #[arg(
        long,
        env = "GEMINI_MODELS",
        value_delimiter = ',',
        default_value = "gemini-2.0-flash,gemini-1.5-flash,gemini-1.5-pro"
    )]
    pub gemini_models: Vec<String>,

    /// Base URL for the Gemini REST API.
    #[arg(
        long,
        env = "GEMINI_BASE_URL",
        default_value = "https://generativelanguage.googleapis.com/v1beta"
    )]
    pub gemini_base_url: String,

    // --- OpenAI-compatible (single-shot) Args ---
    /// API key for the OpenAI-compatible engine. Empty disables it.
    #[arg(long, env = "OPENAI_API_KEY", default_value = "")]
    pub openai_api_key: String,

    /// Model name for the OpenAI-compatible engine (e.g., gpt-4o-mini).
    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4o-mini")]
    pub openai_model: String,

    /// Base URL for the OpenAI-compatible API (e.g., https://api.groq.com/openai).
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com")]
    pub openai_base_url: String,

    // --- Tribunal Args ---
    /// Seconds each engine gets before its answer is discarded.
    #[arg(long, env = "ADAPTER_TIMEOUT_SECS", default_value = "30")]
    pub adapter_timeout_secs: u64,

    /// Upper bound in seconds for any single outbound HTTP request. Engines that
    /// try several models also cap each call at ADAPTER_TIMEOUT_SECS divided by
    /// the number of models, so every fallback model gets its turn.
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value = "25")]
    pub http_timeout_secs: u64,

    // --- Web Search Args ---
    /// API key for the web search service. Empty disables evidence collection.
    #[arg(long, env = "SEARCH_API_KEY", default_value = "")]
    pub search_api_key: String,

    /// Base URL for the web search service.
    #[arg(long, env = "SEARCH_BASE_URL", default_value = "https://api.tavily.com")]
    pub search_base_url: String,

    // --- History Store Args ---
    /// Conversation store type (memory, redis)
    #[arg(long, env = "HISTORY_TYPE", default_value = "memory")]
    pub history_type: String,

    /// Conversation store host endpoint (e.g., redis://127.0.0.1:6379)
    #[arg(long, env = "HISTORY_HOST", default_value = "redis://127.0.0.1:6379")]
    pub history_host: String,

    /// Prefix for Redis conversation keys.
    #[arg(long, env = "HISTORY_REDIS_PREFIX", default_value = "conversation:")]
    pub history_redis_prefix: String,

    // --- Access Args ---
    /// Email allowed to call the /admin endpoints. Unset rejects every admin call.
    #[arg(long, env = "ADMIN_EMAIL")]
    pub admin_email: Option<String>,

    /// Seed entries for the beta tester table, as email:tier pairs (e.g., a@b.com:pro).
    #[arg(long, env = "BETA_TESTERS", value_delimiter = ',')]
    pub beta_testers: Vec<String>,

    /// Optional JSON file overriding the built-in persona instructions.
    #[arg(long, env = "PERSONAS_PATH")]
    pub personas_path: Option<String>,

    // --- Payment Args ---
    /// Stripe secret key. Empty disables checkout sessions.
    #[arg(long, env = "STRIPE_SECRET_KEY", default_value = "")]
    pub stripe_secret_key: String,

    /// Stripe price identifier used for the subscription checkout.
    #[arg(long, env = "STRIPE_PRICE_ID", default_value = "")]
    pub stripe_price_id: String,

    #[arg(long, env = "STRIPE_SUCCESS_URL", default_value = "http://localhost:3000/success")]
    pub stripe_success_url: String,

    #[arg(long, env = "STRIPE_CANCEL_URL", default_value = "http://localhost:3000/cancel")]
    pub stripe_cancel_url: String,

    #[arg(long, env = "STRIPE_BASE_URL", default_value = "https://api.stripe.com")]
    pub stripe_base_url: String,
}

impl Args {
    pub fn tls_paths(&self) -> Option<(&str, &str)> {
        if !self.enable_tls {
            return None;
        }
        match (&self.tls_cert_path, &self.tls_key_path) {
            (Some(cert), Some(key)) => Some((cert.as_str(), key.as_str())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn declared_default(id: &str) -> Vec<String> {
        Args::command()
            .get_arguments()
            .find(|arg| arg.get_id() == id)
            .map(|arg| {
                arg.get_default_values()
                    .iter()
                    .map(|v| v.to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn declared_defaults() {
        assert_eq!(declared_default("history_type"), vec!["memory"]);
        assert_eq!(declared_default("adapter_timeout_secs"), vec!["30"]);
        assert_eq!(
            declared_default("gemini_models"),
            vec!["gemini-2.0-flash,gemini-1.5-flash,gemini-1.5-pro"]
        );
        assert!(declared_default("admin_email").is_empty());
    }

    #[test]
    fn tls_paths_need_the_flag_and_both_files() {
        let mut args = Args::parse_from(["chat-tribunal", "--tls-cert-path", "c.pem", "--tls-key-path", "k.pem"]);
        args.enable_tls = false;
        assert!(args.tls_paths().is_none());
        args.enable_tls = true;
        assert_eq!(args.tls_paths(), Some(("c.pem", "k.pem")));
        args.tls_key_path = None;
        assert!(args.tls_paths().is_none());
    }

    #[test]
    fn model_list_is_comma_delimited() {
        let args = Args::parse_from([
            "chat-tribunal",
            "--gemini-models",
            "a,b",
            "--beta-testers",
            "x@y.com:pro,z@y.com:elite",
        ]);
        assert_eq!(args.gemini_models, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(args.beta_testers.len(), 2);
    }
}
