use arena::AuthorityConfig;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub authority: AuthorityConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: format!("0.0.0.0:{}", arena::DEFAULT_PORT),
            authority: AuthorityConfig::default(),
        }
    }
}
