use anyhow::{Context as _, Result};
use jiracache_core::config::ConfigFile;
use jiracache_core::paths::JiracachePaths;

pub async fn load(paths: &JiracachePaths) -> Result<ConfigFile> {
    let path = &paths.config_file;
    match tokio::fs::read_to_string(path).await {
        Ok(s) => ConfigFile::parse(&s).with_context(|| format!("load {}", path.display())),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(err) => Err(err).with_context(|| format!("read config: {}", path.display())),
    }
}
