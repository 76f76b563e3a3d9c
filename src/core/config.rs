use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub proxy_host: String,
    pub proxy_port: String,
    pub openai_api_hostname: String,
    pub openai_api_key: String,
    pub openai_model: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let proxy_host = env::var("UCP_PROXY_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let proxy_port = env::var("UCP_PROXY_PORT").unwrap_or_else(|_| "2424".to_string());
        let openai_api_hostname =
            env::var("UCP_LLM_HOST").unwrap_or_else(|_| "https://api.openai.com".to_string());
        let openai_api_key =
            env::var("OPENAI_API_KEY").unwrap_or_else(|_| "thiswontworkforopenai".to_string());
        let openai_model =
            env::var("UCP_LLM_MODEL").unwrap_or_else(|_| "gpt-4.1-mini".to_string());

        Self {
            proxy_host,
            proxy_port,
            openai_api_hostname,
            openai_api_key,
            openai_model,
        }
    }
}

impl AppConfig {
    /// Address of the in-process proxy relay the commerce client
    /// talks to.
    pub fn proxy_api_url(&self) -> String {
        format!("http://{}:{}", self.proxy_host, self.proxy_port)
    }
}
