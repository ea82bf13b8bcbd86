use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub llm: LlmConfig,
    pub zep: Option<ZepConfig>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZepConfig {
    pub url: String,
    pub collection: String,
    pub search_limit: usize,
}

#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    server: ServerSection,
    #[serde(default)]
    llm: LlmSection,
    #[serde(default)]
    zep: Option<ZepSection>,
}

#[derive(Debug, Deserialize)]
struct ServerSection {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LlmSection {
    #[serde(default = "default_llm_base_url")]
    base_url: String,
    /// Falls back to `OPENAI_API_KEY` when absent.
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default = "default_model")]
    model: String,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key: None,
            model: default_model(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ZepSection {
    url: String,
    #[serde(default = "default_collection")]
    collection: String,
    #[serde(default = "default_search_limit")]
    search_limit: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_collection() -> String {
    "fever".to_string()
}

fn default_search_limit() -> usize {
    5
}

impl ServerConfig {
    pub fn load() -> anyhow::Result<Self> {
        if let Some(file_config) = load_from_file()? {
            return Self::from_file_config(file_config);
        }

        Self::from_env()
    }

    fn from_file_config(file_config: FileConfig) -> anyhow::Result<Self> {
        let api_key = match file_config.llm.api_key {
            Some(key) => key,
            None => api_key_from_env()?,
        };

        Ok(Self {
            host: file_config.server.host,
            port: file_config.server.port,
            llm: LlmConfig {
                base_url: file_config.llm.base_url,
                api_key,
                model: file_config.llm.model,
            },
            zep: file_config.zep.map(|zep| ZepConfig {
                url: zep.url,
                collection: zep.collection,
                search_limit: zep.search_limit,
            }),
        })
    }

    fn from_env() -> anyhow::Result<Self> {
        let host = env::var("ZEPCHAT_HOST").unwrap_or_else(|_| default_host());
        let port = env::var("ZEPCHAT_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or_else(default_port);
        let base_url = env::var("ZEPCHAT_LLM_BASE_URL").unwrap_or_else(|_| default_llm_base_url());
        let model = env::var("ZEPCHAT_MODEL").unwrap_or_else(|_| default_model());
        let zep = env::var("ZEP_API_URL").ok().map(|url| ZepConfig {
            url,
            collection: env::var("ZEPCHAT_COLLECTION").unwrap_or_else(|_| default_collection()),
            search_limit: env::var("ZEPCHAT_SEARCH_LIMIT")
                .ok()
                .and_then(|value| value.parse::<usize>().ok())
                .unwrap_or_else(default_search_limit),
        });

        Ok(Self {
            host,
            port,
            llm: LlmConfig {
                base_url,
                api_key: api_key_from_env()?,
                model,
            },
            zep,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn api_key_from_env() -> anyhow::Result<String> {
    env::var("OPENAI_API_KEY")
        .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY is not set and no llm.api_key configured"))
}

fn load_from_file() -> anyhow::Result<Option<FileConfig>> {
    let config_path = env::var("ZEPCHAT_SERVER_CONFIG").ok();
    let path = if let Some(path) = config_path {
        Some(path)
    } else if Path::new("server.toml").exists() {
        Some("server.toml".to_string())
    } else {
        None
    };

    let Some(path) = path else {
        return Ok(None);
    };

    parse_file(Path::new(&path)).map(Some)
}

fn parse_file(path: &Path) -> anyhow::Result<FileConfig> {
    let contents = fs::read_to_string(path)
        .map_err(|err| anyhow::anyhow!("Failed to read config {}: {}", path.display(), err))?;
    toml::from_str(&contents)
        .map_err(|err| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_full_file_config() {
        let file = write_config(
            r#"
[server]
host = "127.0.0.1"
port = 9000

[llm]
base_url = "http://localhost:11434/v1"
api_key = "sk-test"
model = "llama3"

[zep]
url = "http://localhost:8000"
collection = "faq"
"#,
        );

        let parsed = parse_file(file.path()).unwrap();
        let config = ServerConfig::from_file_config(parsed).unwrap();

        assert_eq!(config.bind_addr(), "127.0.0.1:9000");
        assert_eq!(
            config.llm,
            LlmConfig {
                base_url: "http://localhost:11434/v1".to_string(),
                api_key: "sk-test".to_string(),
                model: "llama3".to_string(),
            }
        );
        assert_eq!(
            config.zep,
            Some(ZepConfig {
                url: "http://localhost:8000".to_string(),
                collection: "faq".to_string(),
                search_limit: 5,
            })
        );
    }

    #[test]
    fn test_sections_default() {
        let file = write_config("[llm]\napi_key = \"sk-test\"\n");

        let config = ServerConfig::from_file_config(parse_file(file.path()).unwrap()).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.llm.model, "gpt-3.5-turbo");
        assert!(config.zep.is_none());
    }

    #[test]
    fn test_invalid_file_is_reported() {
        let file = write_config("[server]\nport = \"not a number\"\n");
        let error = parse_file(file.path()).unwrap_err();
        assert!(error.to_string().contains("Failed to parse config"));
    }
}
