use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathInputs {
    pub home_dir: PathBuf,
    pub xdg_config_home: Option<PathBuf>,
    pub dir_override: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JiracachePaths {
    pub base_dir: PathBuf,
    pub log_path: PathBuf,

    pub config_dir: PathBuf,
    pub config_file: PathBuf,
}

pub const LOG_FILE_PREFIX: &str = "jiracache";
pub const LOG_FILE_SUFFIX: &str = "log";

pub fn compute_paths(inputs: PathInputs) -> JiracachePaths {
    let base_dir = inputs
        .dir_override
        .clone()
        .unwrap_or_else(|| inputs.home_dir.join(".jiracache"));

    let config_dir = match inputs.dir_override {
        Some(ref override_dir) => override_dir.join("config"),
        None => inputs
            .xdg_config_home
            .unwrap_or_else(|| inputs.home_dir.join(".config"))
            .join("jiracache"),
    };

    JiracachePaths {
        log_path: base_dir.join(format!("{LOG_FILE_PREFIX}.{LOG_FILE_SUFFIX}")),
        config_file: config_dir.join("config.toml"),
        base_dir,
        config_dir,
    }
}
