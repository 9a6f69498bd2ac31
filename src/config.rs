use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "momentos", about = "Event photo sharing server")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub media: MediaConfig,
    pub admin: AdminConfig,
    pub captions: CaptionConfig,
    pub tv: TvConfig,
    pub plans: PlansConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Externally reachable base URL, used for share links and QR codes.
    pub public_url: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct MediaConfig {
    pub max_image_mb: u64,
    pub max_video_mb: u64,
    pub image_target_kb: u64,
    pub image_max_dimension: u32,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AdminConfig {
    pub email: String,
    pub password: String,
    pub cookie_name: String,
    pub session_hours: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct CaptionConfig {
    /// HTTP endpoint of the caption generator. Suggestions are disabled when unset.
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub keywords: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct TvConfig {
    pub poll_seconds: u64,
    pub slide_seconds: u64,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct PlansConfig {
    pub path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            public_url: None,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_image_mb: 10,
            max_video_mb: 50,
            image_target_kb: 950,
            image_max_dimension: 1920,
        }
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            email: "admin@momentos.local".to_string(),
            password: "change-me".to_string(),
            cookie_name: "momentos_admin".to_string(),
            session_hours: 12,
        }
    }
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_secs: 20,
            keywords: "wedding, celebration, joy, love, marriage, party".to_string(),
        }
    }
}

impl Default for TvConfig {
    fn default() -> Self {
        Self {
            poll_seconds: 15,
            slide_seconds: 5,
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        Ok(config.resolve_paths(&data_dir))
    }

    /// Fill in every unset path relative to `data_dir`.
    pub fn resolve_paths(mut self, data_dir: &Path) -> Self {
        if self.database.path.is_none() {
            self.database.path = Some(data_dir.join("momentos.db"));
        }
        if self.storage.path.is_none() {
            self.storage.path = Some(data_dir.join("uploads"));
        }
        if self.plans.path.is_none() {
            self.plans.path = Some(data_dir.join("plans.json"));
        }
        self
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".momentos")
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("momentos.db"))
    }

    pub fn uploads_path(&self) -> PathBuf {
        self.storage
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("uploads"))
    }

    pub fn plans_path(&self) -> PathBuf {
        self.plans
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("plans.json"))
    }

    /// Base URL guests use to reach the server.
    pub fn public_url(&self) -> String {
        match &self.server.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}:{}", self.server.host, self.server.port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli_for(dir: &Path) -> Cli {
        Cli {
            config: None,
            host: None,
            port: None,
            data_dir: Some(dir.to_path_buf()),
        }
    }

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.admin.cookie_name, "momentos_admin");
        assert_eq!(config.admin.session_hours, 12);
        assert_eq!(config.media.max_image_mb, 10);
        assert_eq!(config.media.max_video_mb, 50);
        assert_eq!(config.tv.poll_seconds, 15);
        assert!(config.captions.endpoint.is_none());
        assert!(config.database.path.is_none());
    }

    #[test]
    fn data_dir_uses_cli_override() {
        let cli = cli_for(Path::new("/tmp/test-momentos"));
        assert_eq!(Config::data_dir(&cli), PathBuf::from("/tmp/test-momentos"));
    }

    #[test]
    fn data_dir_defaults_to_home_dot_momentos() {
        let cli = Cli {
            config: None,
            host: None,
            port: None,
            data_dir: None,
        };
        assert!(Config::data_dir(&cli).ends_with(".momentos"));
    }

    #[test]
    fn load_with_no_config_file_resolves_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load(&cli_for(tmp.path())).unwrap();
        assert_eq!(config.db_path(), tmp.path().join("momentos.db"));
        assert_eq!(config.uploads_path(), tmp.path().join("uploads"));
        assert_eq!(config.plans_path(), tmp.path().join("plans.json"));
    }

    #[test]
    fn load_reads_toml_file_and_cli_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
host = "192.168.1.1"
port = 9000
public_url = "https://fotos.example.com/"

[admin]
email = "host@example.com"
password = "secret"

[captions]
endpoint = "http://localhost:8081/caption"

[tv]
poll_seconds = 10
"#,
        )
        .unwrap();

        let cli = Cli {
            config: Some(config_path),
            host: None,
            port: Some(4000),
            data_dir: Some(tmp.path().to_path_buf()),
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "192.168.1.1");
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.public_url(), "https://fotos.example.com");
        assert_eq!(config.admin.email, "host@example.com");
        assert_eq!(config.admin.session_hours, 12);
        assert_eq!(
            config.captions.endpoint.as_deref(),
            Some("http://localhost:8081/caption")
        );
        assert_eq!(config.tv.poll_seconds, 10);
        assert_eq!(config.tv.slide_seconds, 5);
    }
}
