//! TOML 配置加载
//!
//! 只负责把文件读出来并反序列化，字段的合法性由各自的类型校验。

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

#[derive(Debug, thiserror::Error)]
pub enum LoadSettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// 从 TOML 文件加载配置
pub fn load_toml<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, LoadSettingsError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| LoadSettingsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let settings = toml::from_str(&text).map_err(|source| LoadSettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    log::info!("loaded settings from {}", path.display());
    Ok(settings)
}

/// 文件存在时加载，否则使用默认值
pub fn load_toml_or_default<T: DeserializeOwned + Default>(path: impl AsRef<Path>) -> Result<T, LoadSettingsError> {
    let path = path.as_ref();
    if path.exists() {
        load_toml(path)
    } else {
        log::info!("settings file {} not found, using defaults", path.display());
        Ok(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, serde::Deserialize, PartialEq)]
    #[serde(default)]
    struct Sample {
        name: String,
        count: u32,
    }

    fn temp_file(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("lumen-settings-{}-{name}", std::process::id()));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_toml() {
        let path = temp_file("ok.toml", "name = \"abc\"\ncount = 3\n");
        let sample: Sample = load_toml(&path).unwrap();
        assert_eq!(
            sample,
            Sample {
                name: "abc".to_string(),
                count: 3
            }
        );
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_parse_error_keeps_path() {
        let path = temp_file("bad.toml", "count = \"three\"\n");
        let err = load_toml::<Sample>(&path).unwrap_err();
        assert!(matches!(err, LoadSettingsError::Parse { .. }));
        assert!(err.to_string().contains("bad.toml"));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_missing_file_uses_default() {
        let path = std::env::temp_dir().join("lumen-settings-does-not-exist.toml");
        let sample: Sample = load_toml_or_default(&path).unwrap();
        assert_eq!(sample, Sample::default());
    }
}
