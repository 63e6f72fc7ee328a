use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AppConfig {
    pub log_level: String,
    pub server_url: String,
    pub user_id: Option<String>,
    pub role: String,
    pub max_concurrent: usize,
    pub log_dir: PathBuf,
}

pub struct AppConfigOverrides {
    pub log_level: Option<String>,
    pub server_url: Option<String>,
    pub user_id: Option<String>,
    pub max_concurrent: Option<usize>,
}

fn base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".vaultup")
}

impl AppConfig {
    pub fn load_from(path: Option<PathBuf>) -> Self {
        let mut builder = config::Config::builder();
        let path = path.unwrap_or_else(|| base_dir().join("config"));
        builder = builder.add_source(
            config::File::from(path)
                .format(config::FileFormat::Toml)
                .required(false),
        );
        let cfg = builder.build().unwrap_or_default();

        let log_level = cfg
            .get_string("log_level")
            .unwrap_or_else(|_| "info".to_string());
        let server_url = cfg
            .get_string("server_url")
            .unwrap_or_else(|_| "http://localhost:5000".to_string());
        let user_id = cfg.get_string("user_id").ok();
        let role = cfg.get_string("role").unwrap_or_else(|_| "user".to_string());
        let max_concurrent = cfg
            .get_int("max_concurrent")
            .ok()
            .filter(|n| *n > 0)
            .map(|n| n as usize)
            .unwrap_or(uploader::DEFAULT_MAX_CONCURRENT);
        let log_dir = cfg
            .get_string("log_dir")
            .map(PathBuf::from)
            .unwrap_or_else(|_| base_dir());

        Self {
            log_level,
            server_url,
            user_id,
            role,
            max_concurrent,
            log_dir,
        }
    }

    pub fn apply_overrides(mut self, ov: &AppConfigOverrides) -> Self {
        if let Some(l) = &ov.log_level {
            self.log_level = l.clone();
        }
        if let Some(url) = &ov.server_url {
            self.server_url = url.clone();
        }
        if let Some(user) = &ov.user_id {
            self.user_id = Some(user.clone());
        }
        if let Some(n) = ov.max_concurrent {
            self.max_concurrent = n.max(1);
        }
        self
    }

    #[allow(dead_code)]
    pub fn save_to(&self, path: Option<PathBuf>) -> std::io::Result<()> {
        let path = path.unwrap_or_else(|| base_dir().join("config"));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = toml::to_string(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, data)
    }
}
