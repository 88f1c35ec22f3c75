use scrub_core::{DeletionRuleSet, Settings};
use serde::{Deserialize, Serialize};

use crate::workspace::DEFAULT_MANIFEST_PATTERNS;

/// Contents of `scrub.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    #[serde(flatten)]
    pub settings: Settings,
    pub host: HostConfig,
}

/// Terminal host settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Glob patterns of project manifest files
    pub manifest_patterns: Vec<String>,
    /// Command run as the default clean, empty for none
    pub native_clean_command: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            manifest_patterns: DEFAULT_MANIFEST_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            native_clean_command: String::new(),
        }
    }
}

/// Rule switches given on the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleOverrides {
    pub packages: bool,
    pub test_results: bool,
    pub ide_metadata: bool,
    pub external_logs: bool,
    pub external_traces: bool,
    pub no_build_output: bool,
    pub no_native_clean: bool,
}

impl RuleOverrides {
    /// Flags only switch rules on, except the `no_*` ones
    pub fn apply(&self, rules: &mut DeletionRuleSet) {
        rules.delete_packages_folder |= self.packages;
        rules.delete_test_results_folder |= self.test_results;
        rules.delete_ide_metadata_folder |= self.ide_metadata;
        rules.delete_external_log_folder |= self.external_logs;
        rules.delete_external_trace_folder |= self.external_traces;

        if self.no_build_output {
            rules.delete_build_output_folders = false;
        }
        if self.no_native_clean {
            rules.run_native_clean = false;
        }
    }
}
