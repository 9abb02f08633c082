use std::path::Path;

use anyhow::{Context, Result};
use stopgrid_sim::SimConfig;

/// Read a [`SimConfig`] from a TOML file. Missing keys keep their defaults.
pub fn from_file(path: &Path) -> Result<SimConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: SimConfig =
        toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: SimConfig = toml::from_str(
            r#"
            min_side = 6
            max_side = 6
            seek_mode = true
            seed = 11
            "#,
        )
        .unwrap();
        assert_eq!(config.min_side, 6);
        assert!(config.seek_mode);
        assert_eq!(config.seed, Some(11));
        assert_eq!(config.tile_size, 5);
        assert_eq!(config.retry_delay, 30);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = from_file(Path::new("/nonexistent/stopgrid.toml")).unwrap_err();
        assert!(err.to_string().contains("reading config"));
    }
}
