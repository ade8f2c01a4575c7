//! Analysis configuration.
//!
//! Every field has a default, so the tool runs without a config file
//! against `UPDATED_DATA.csv` in the working directory.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::bootstrap::BootstrapConfig;

/// Mediators analysed by the batch modes when none are configured.
pub const DEFAULT_VARIABLES: &[&str] = &[
    "Brf_P_Init_T",
    "Brf_P_PlnOrg_T",
    "ADHD_Inattention_Composite_Score",
    "WISC_PSI_Processing_Speed_Index",
    "WMem_Composite_Score",
    "WISC4_PRI_Perceptual_Reasoning_Index",
    "WISC_FSIQ",
    "PKT_Total_Correct",
    "Social_Motivation_Composite_Score",
    "SRS_P_2_Restricted_Interest_and_Repetitive_Behavior_T_Score",
    "Motor_Composite_Score",
];

/// Which dataset to analyse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DataSource {
    /// Full dataset.
    #[default]
    Data,
    /// ADOS subset.
    Ados,
}

/// Display names of the X == 1 and X == 0 groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupLabels {
    pub treated: String,
    pub control: String,
}

impl Default for GroupLabels {
    fn default() -> Self {
        Self {
            treated: "ASD".to_string(),
            control: "NON-ASD".to_string(),
        }
    }
}

/// Analysis configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// CSV with the full dataset.
    pub data: PathBuf,
    /// CSV with the ADOS subset.
    pub ados_data: Option<PathBuf>,
    pub predictor: String,
    pub outcome: String,
    /// Candidate mediators.
    pub variables: Vec<String>,
    pub bootstrap: BootstrapConfig,
    /// Directory for histogram PNGs.
    pub output_dir: PathBuf,
    pub groups: GroupLabels,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            data: PathBuf::from("UPDATED_DATA.csv"),
            ados_data: None,
            predictor: "PrimaryDx_ASD".to_string(),
            outcome: "PercentAccuracy_GTI".to_string(),
            variables: DEFAULT_VARIABLES.iter().map(ToString::to_string).collect(),
            bootstrap: BootstrapConfig::default(),
            output_dir: PathBuf::from("Model_Histograms"),
            groups: GroupLabels::default(),
        }
    }
}

impl AnalysisConfig {
    /// CSV path for `source`. The ADOS source falls back to the full data.
    pub fn data_path(&self, source: DataSource) -> &Path {
        match (source, &self.ados_data) {
            (DataSource::Ados, Some(path)) => path,
            (DataSource::Ados, None) => {
                log::warn!("no ados_data configured; using {}", self.data.display());
                &self.data
            }
            (DataSource::Data, _) => &self.data,
        }
    }

    /// Configured variables other than the predictor and outcome.
    pub fn mediators(&self) -> Vec<String> {
        self.variables
            .iter()
            .filter(|v| **v != self.predictor && **v != self.outcome)
            .cloned()
            .collect()
    }
}

/// Parses a YAML analysis configuration.
pub fn load_config(content: &str) -> anyhow::Result<AnalysisConfig> {
    let config: AnalysisConfig = serde_yaml_ng::from_str(content)?;
    if config.bootstrap.replicates == 0 {
        anyhow::bail!("bootstrap.replicates must be at least 1");
    }
    if !(0.0..1.0).contains(&config.bootstrap.confidence) {
        anyhow::bail!("bootstrap.confidence must lie in [0, 1)");
    }
    Ok(config)
}

/// Reads and parses a YAML analysis configuration file.
pub fn load_config_file(path: &Path) -> anyhow::Result<AnalysisConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    load_config(&content).with_context(|| format!("Failed to parse config {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = load_config("{}").unwrap();
        assert_eq!(config.predictor, "PrimaryDx_ASD");
        assert_eq!(config.outcome, "PercentAccuracy_GTI");
        assert_eq!(config.variables.len(), 11);
        assert_eq!(config.bootstrap.replicates, 2000);
        assert_eq!(config.output_dir, PathBuf::from("Model_Histograms"));
    }

    #[test]
    fn test_parse_analysis_config() {
        let yaml = r#"
data: "study.csv"
predictor: Group
outcome: Accuracy
variables: [IQ, Motor, Group]
bootstrap:
  replicates: 500
  seed: 42
groups:
  treated: Case
"#;
        let config = load_config(yaml).unwrap();
        assert_eq!(config.data, PathBuf::from("study.csv"));
        assert_eq!(config.bootstrap.replicates, 500);
        assert_eq!(config.bootstrap.seed, Some(42));
        assert!((config.bootstrap.significance - 0.05).abs() < f64::EPSILON);
        assert_eq!(config.groups.treated, "Case");
        assert_eq!(config.groups.control, "NON-ASD");
        assert_eq!(config.mediators(), vec!["IQ".to_string(), "Motor".to_string()]);
    }

    #[test]
    fn test_zero_replicates_rejected() {
        assert!(load_config("bootstrap:\n  replicates: 0\n").is_err());
    }

    #[test]
    fn test_ados_falls_back_to_data() {
        let mut config = AnalysisConfig::default();
        assert_eq!(config.data_path(DataSource::Ados), Path::new("UPDATED_DATA.csv"));
        config.ados_data = Some(PathBuf::from("ados.csv"));
        assert_eq!(config.data_path(DataSource::Ados), Path::new("ados.csv"));
        assert_eq!(config.data_path(DataSource::Data), Path::new("UPDATED_DATA.csv"));
    }
}
