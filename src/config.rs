//! Project configuration pair: `kaggle.yml` holds the user-facing
//! settings, `kernel-metadata.json` is what the CLI actually consumes.
//! Push syncs the former into the latter before every upload.

use color_eyre::eyre::{eyre, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "kaggle.yml";
pub const METADATA_FILE: &str = "kernel-metadata.json";
pub const DEFAULT_OUTPUT_DIR: &str = ".kaggle-outputs";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accelerator {
    None,
    Gpu,
    Tpu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    Private,
    Public,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_to: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub kernel_slug: String,
    #[serde(default)]
    pub code_file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accelerator: Option<Accelerator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internet: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy: Option<Privacy>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub datasets: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub competitions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<OutputsConfig>,
}

impl ProjectConfig {
    pub async fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        let raw = tokio::fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                eyre!("{CONFIG_FILE} not found. Run `kgw init` first.")
            } else {
                eyre!("failed to read {CONFIG_FILE}: {e}")
            }
        })?;
        serde_yaml::from_str(&raw).wrap_err_with(|| format!("malformed {CONFIG_FILE}"))
    }

    /// Best-effort load for status resolution: a missing or malformed
    /// config degrades to defaults instead of failing the refresh.
    pub async fn load_or_default(root: &Path) -> Self {
        match tokio::fs::read_to_string(root.join(CONFIG_FILE)).await {
            Ok(raw) => serde_yaml::from_str(&raw).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub async fn save(&self, root: &Path) -> Result<()> {
        let raw = serde_yaml::to_string(self)?;
        tokio::fs::write(root.join(CONFIG_FILE), raw)
            .await
            .wrap_err_with(|| format!("failed to write {CONFIG_FILE}"))?;
        Ok(())
    }

    pub fn output_dir(&self, root: &Path) -> PathBuf {
        let rel = self
            .outputs
            .as_ref()
            .and_then(|o| o.download_to.as_deref())
            .unwrap_or(DEFAULT_OUTPUT_DIR);
        root.join(rel)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelMetadata {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub code_file: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_kernel_type")]
    pub kernel_type: String,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub enable_gpu: bool,
    #[serde(default)]
    pub enable_tpu: bool,
    #[serde(default)]
    pub enable_internet: bool,
    #[serde(default)]
    pub dataset_sources: Vec<String>,
    #[serde(default)]
    pub competition_sources: Vec<String>,
}

fn default_language() -> String {
    "python".to_string()
}

fn default_kernel_type() -> String {
    "notebook".to_string()
}

impl Default for KernelMetadata {
    fn default() -> Self {
        Self {
            id: String::new(),
            title: None,
            code_file: String::new(),
            language: default_language(),
            kernel_type: default_kernel_type(),
            is_private: true,
            enable_gpu: false,
            enable_tpu: false,
            enable_internet: false,
            dataset_sources: Vec::new(),
            competition_sources: Vec::new(),
        }
    }
}

impl KernelMetadata {
    pub async fn load(root: &Path) -> Result<Self> {
        let path = root.join(METADATA_FILE);
        let raw = tokio::fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                eyre!("{METADATA_FILE} not found. Run `kgw init` first.")
            } else {
                eyre!("failed to read {METADATA_FILE}: {e}")
            }
        })?;
        serde_json::from_str(&raw).wrap_err_with(|| format!("malformed {METADATA_FILE}"))
    }

    pub async fn load_or_default(root: &Path) -> Self {
        match tokio::fs::read_to_string(root.join(METADATA_FILE)).await {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub async fn save(&self, root: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        tokio::fs::write(root.join(METADATA_FILE), raw)
            .await
            .wrap_err_with(|| format!("failed to write {METADATA_FILE}"))?;
        Ok(())
    }

    /// Carries the yml settings into the metadata the CLI reads. Fields
    /// absent from the yml keep their current metadata values.
    pub fn sync_from(&mut self, cfg: &ProjectConfig) {
        if !cfg.kernel_slug.is_empty() {
            self.id = cfg.kernel_slug.clone();
        }
        if !cfg.code_file.is_empty() {
            self.code_file = cfg.code_file.clone();
        }
        self.is_private = cfg.privacy.unwrap_or(Privacy::Private) == Privacy::Private;
        self.enable_gpu = cfg.accelerator == Some(Accelerator::Gpu);
        self.enable_tpu = cfg.accelerator == Some(Accelerator::Tpu);
        self.enable_internet = cfg.internet.unwrap_or(false);
        if !cfg.datasets.is_empty() {
            self.dataset_sources = cfg.datasets.clone();
        }
        if !cfg.competitions.is_empty() {
            self.competition_sources = cfg.competitions.clone();
        }
    }

    /// The `<owner>/<slug>` handle used for status and output queries.
    pub fn kernel_ref(&self) -> Option<&str> {
        if self.id.is_empty() {
            None
        } else {
            Some(self.id.as_str())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE_YML: &str = "\
project: house-prices
kernel_slug: alice/house-prices-eda
code_file: analysis.ipynb
accelerator: gpu
internet: true
privacy: public
datasets:
  - alice/train-data
outputs:
  download_to: artifacts
";

    #[test]
    fn parse_full_yml() {
        let cfg: ProjectConfig = serde_yaml::from_str(SAMPLE_YML).unwrap();
        assert_eq!(cfg.project, "house-prices");
        assert_eq!(cfg.kernel_slug, "alice/house-prices-eda");
        assert_eq!(cfg.accelerator, Some(Accelerator::Gpu));
        assert_eq!(cfg.internet, Some(true));
        assert_eq!(cfg.privacy, Some(Privacy::Public));
        assert_eq!(cfg.datasets, vec!["alice/train-data".to_string()]);
        assert_eq!(
            cfg.outputs.unwrap().download_to.as_deref(),
            Some("artifacts")
        );
    }

    #[test]
    fn parse_minimal_yml() {
        let cfg: ProjectConfig = serde_yaml::from_str("kernel_slug: a/b\n").unwrap();
        assert_eq!(cfg.kernel_slug, "a/b");
        assert_eq!(cfg.accelerator, None);
        assert!(cfg.datasets.is_empty());
    }

    #[test]
    fn yml_round_trip() {
        let cfg: ProjectConfig = serde_yaml::from_str(SAMPLE_YML).unwrap();
        let dumped = serde_yaml::to_string(&cfg).unwrap();
        let again: ProjectConfig = serde_yaml::from_str(&dumped).unwrap();
        assert_eq!(cfg, again);
    }

    #[test]
    fn output_dir_default_and_override() {
        let root = Path::new("/work");
        let cfg = ProjectConfig::default();
        assert_eq!(cfg.output_dir(root), root.join(DEFAULT_OUTPUT_DIR));

        let cfg = ProjectConfig {
            outputs: Some(OutputsConfig {
                download_to: Some("artifacts".to_string()),
            }),
            ..Default::default()
        };
        assert_eq!(cfg.output_dir(root), root.join("artifacts"));
    }

    #[test]
    fn sync_carries_toggles_into_metadata() {
        let cfg: ProjectConfig = serde_yaml::from_str(SAMPLE_YML).unwrap();
        let mut meta = KernelMetadata::default();
        meta.sync_from(&cfg);
        assert_eq!(meta.id, "alice/house-prices-eda");
        assert_eq!(meta.code_file, "analysis.ipynb");
        assert!(!meta.is_private);
        assert!(meta.enable_gpu);
        assert!(!meta.enable_tpu);
        assert!(meta.enable_internet);
        assert_eq!(meta.dataset_sources, vec!["alice/train-data".to_string()]);
    }

    #[test]
    fn sync_defaults_to_private_cpu_offline() {
        let cfg = ProjectConfig {
            kernel_slug: "a/b".to_string(),
            ..Default::default()
        };
        let mut meta = KernelMetadata {
            enable_gpu: true,
            enable_internet: true,
            is_private: false,
            ..Default::default()
        };
        meta.sync_from(&cfg);
        assert!(meta.is_private);
        assert!(!meta.enable_gpu);
        assert!(!meta.enable_internet);
    }

    #[test]
    fn sync_keeps_metadata_id_when_slug_empty() {
        let cfg = ProjectConfig::default();
        let mut meta = KernelMetadata {
            id: "alice/existing".to_string(),
            ..Default::default()
        };
        meta.sync_from(&cfg);
        assert_eq!(meta.id, "alice/existing");
    }

    #[test]
    fn metadata_json_round_trip() {
        let meta = KernelMetadata {
            id: "alice/nb".to_string(),
            title: Some("NB".to_string()),
            code_file: "nb.ipynb".to_string(),
            enable_gpu: true,
            ..Default::default()
        };
        let raw = serde_json::to_string_pretty(&meta).unwrap();
        let again: KernelMetadata = serde_json::from_str(&raw).unwrap();
        assert_eq!(meta, again);
    }

    #[test]
    fn kernel_ref_requires_id() {
        assert_eq!(KernelMetadata::default().kernel_ref(), None);
        let meta = KernelMetadata {
            id: "alice/nb".to_string(),
            ..Default::default()
        };
        assert_eq!(meta.kernel_ref(), Some("alice/nb"));
    }

    #[tokio::test]
    async fn load_missing_config_hints_init() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProjectConfig::load(dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("kgw init"));
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ProjectConfig {
            kernel_slug: "alice/nb".to_string(),
            code_file: "nb.ipynb".to_string(),
            ..Default::default()
        };
        cfg.save(dir.path()).await.unwrap();
        let loaded = ProjectConfig::load(dir.path()).await.unwrap();
        assert_eq!(loaded, cfg);
    }

    #[tokio::test]
    async fn load_or_default_swallows_malformed() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join(CONFIG_FILE), ": not yaml :\n- {")
            .await
            .unwrap();
        let cfg = ProjectConfig::load_or_default(dir.path()).await;
        assert_eq!(cfg, ProjectConfig::default());
    }
}
