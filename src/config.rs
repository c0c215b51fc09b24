use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::layout::TsneConfig;

pub const CONFIG_ENV: &str = "CITE_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "citations.yaml";

pub const DEFAULT_SOURCE_DIR: &str = "export";

/// Where the content-store export is read from. At most one of `dir` and
/// `url` may be set; neither means `./export`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub dir: Option<PathBuf>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Source<'a> {
    Dir(&'a Path),
    Url(&'a str),
}

impl SourceConfig {
    pub fn dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            url: None,
        }
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self {
            dir: None,
            url: Some(url.into()),
        }
    }

    pub fn resolve(&self) -> Result<Source<'_>> {
        match (&self.dir, &self.url) {
            (Some(_), Some(_)) => bail!("config: source sets both dir and url, pick one"),
            (Some(dir), None) => Ok(Source::Dir(dir)),
            (None, Some(url)) => Ok(Source::Url(url)),
            (None, None) => Ok(Source::Dir(Path::new(DEFAULT_SOURCE_DIR))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Every locale a citation page is emitted for.
    pub locales: Vec<String>,
    /// Locale served without a path prefix.
    pub default_locale: String,
    pub source: SourceConfig,
    pub output_dir: PathBuf,
    pub layout: TsneConfig,
    /// Fixes the layout's random initialisation. Unset means a fresh layout per build.
    pub layout_seed: Option<u64>,
    pub resolve_flagged_dissimilar: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            locales: vec!["en".into(), "es".into(), "fr".into()],
            default_locale: "en".into(),
            source: SourceConfig::default(),
            output_dir: PathBuf::from("public"),
            layout: TsneConfig::default(),
            layout_seed: None,
            resolve_flagged_dissimilar: false,
        }
    }
}

impl BuildConfig {
    pub fn validate(&self) -> Result<()> {
        self.source.resolve()?;
        if self.locales.is_empty() {
            bail!("config: at least one locale is required");
        }
        if !self.locales.contains(&self.default_locale) {
            bail!(
                "config: default_locale '{}' is not one of {:?}",
                self.default_locale,
                self.locales
            );
        }
        if self.layout.output_dims < 2 {
            bail!("config: layout.output_dims must be at least 2, got {}", self.layout.output_dims);
        }
        if !(self.layout.perplexity > 0.0) {
            bail!("config: layout.perplexity must be positive");
        }
        if !(self.layout.learning_rate > 0.0) {
            bail!("config: layout.learning_rate must be positive");
        }
        Ok(())
    }
}

/// Config path: explicit argument, else `$CITE_CONFIG`, else `./citations.yaml` if it exists.
pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(p) = explicit {
        return Some(PathBuf::from(p));
    }
    if let Ok(p) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(p));
    }
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    local.exists().then_some(local)
}

pub fn load_config(path: &Path) -> Result<BuildConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("config not found at {}", path.display()))?;
    let cfg: BuildConfig = serde_yaml::from_str(&raw)
        .with_context(|| format!("parsing config {}", path.display()))?;
    cfg.validate()?;
    debug!("Loaded config from {}", path.display());
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let cfg: BuildConfig = serde_yaml::from_str(
            "locales: [en, es]\nsource:\n  url: https://store.example.com/export\nlayout:\n  max_iterations: 500\n",
        )
        .unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.locales, vec!["en", "es"]);
        assert_eq!(
            cfg.source.resolve().unwrap(),
            Source::Url("https://store.example.com/export")
        );
        assert_eq!(cfg.layout.max_iterations, 500);
        assert_eq!(cfg.layout.perplexity, 30.0);
        assert_eq!(cfg.layout.early_exaggeration, 3.0);
        assert_eq!(cfg.layout.learning_rate, 100.0);
        assert_eq!(cfg.default_locale, "en");
        assert!(!cfg.resolve_flagged_dissimilar);
    }

    #[test]
    fn rejects_unknown_default_locale() {
        let cfg = BuildConfig {
            default_locale: "de".into(),
            ..BuildConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_one_dimensional_layout() {
        let mut cfg = BuildConfig::default();
        cfg.layout.output_dims = 1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn source_defaults_to_export_dir() {
        let cfg: BuildConfig = serde_yaml::from_str("output_dir: out\n").unwrap();
        assert_eq!(cfg.source.resolve().unwrap(), Source::Dir(Path::new("export")));
    }

    #[test]
    fn rejects_source_with_dir_and_url() {
        let cfg: BuildConfig =
            serde_yaml::from_str("source:\n  dir: export\n  url: https://store.example.com/\n")
                .unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn example_config_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("citations.example.yaml");
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.source.resolve().unwrap(), Source::Dir(Path::new("export")));
        assert_eq!(cfg.locales, vec!["en", "es", "fr"]);
        assert_eq!(cfg.layout.min_gradient_norm, 1e-7);
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("citations.yaml");
        std::fs::write(&path, "output_dir: site/public\nlayout_seed: 3\n").unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.output_dir, PathBuf::from("site/public"));
        assert_eq!(cfg.layout_seed, Some(3));
    }
}
