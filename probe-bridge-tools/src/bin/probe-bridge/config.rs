use anyhow::Context;
use figment::{
    providers::{Data, Env, Format as _, Json, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use crate::util::logging::LevelFilter;

/// Settings applied before any command given on the command line.
///
/// Every setting is turned into a command line, so configured values go through the
/// same validation as commands typed by hand.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    pub log_level: Option<LevelFilter>,
    /// Log file, or a directory in which a new log file is created on every run.
    pub log_file: Option<PathBuf>,
    /// The adapter driver to bind.
    pub adapter: Option<String>,
    /// The transports the adapter may use, instead of the ones the driver declares.
    pub transports: Vec<String>,
    /// The transport to select.
    pub transport: Option<String>,
    pub adapter_khz: Option<u32>,
    /// Reset configuration tokens.
    pub reset_config: Vec<String>,
    /// Adapter signals to define, name to mask.
    pub signals: BTreeMap<String, u32>,
    /// Command lines to run after the settings above.
    pub commands: Vec<String>,
}

impl ToolConfig {
    /// Loads the configuration from all known locations.
    ///
    /// Later sources override earlier ones: `.probe-bridge.{toml,json,yaml}` in the working
    /// directory and then the home directory, the explicitly given file, and finally
    /// `PROBE_BRIDGE_*` environment variables.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        // Paths to search for the configuration file.
        let mut paths = vec![PathBuf::from(".")];
        if let Some(home) = directories::UserDirs::new().map(|user| user.home_dir().to_path_buf()) {
            paths.push(home);
        }

        let default_config = serde_json::to_string_pretty(&ToolConfig::default())?;
        let mut figment = Figment::from(Data::<Json>::string(&default_config));
        for path in paths {
            figment = figment
                .merge(Toml::file(path.join(".probe-bridge.toml")))
                .merge(Json::file(path.join(".probe-bridge.json")))
                .merge(Yaml::file(path.join(".probe-bridge.yaml")));
        }

        if let Some(file) = explicit {
            figment = match file.extension().and_then(|e| e.to_str()) {
                Some("toml") => figment.merge(Toml::file(file)),
                Some("json") => figment.merge(Json::file(file)),
                Some("yml" | "yaml") => figment.merge(Yaml::file(file)),
                _ => anyhow::bail!(
                    "File format of {} not recognized from extension (supported: .toml, .json, .yaml / .yml)",
                    file.display()
                ),
            };
        }

        Self::extract(figment.merge(Env::prefixed("PROBE_BRIDGE_")))
    }

    fn extract(figment: Figment) -> anyhow::Result<Self> {
        figment
            .extract()
            .context("The configuration is invalid.")
    }

    /// The command lines which apply this configuration, in execution order.
    pub fn startup_commands(&self) -> Vec<String> {
        let mut lines = Vec::new();

        if !self.transports.is_empty() {
            lines.push(format!("interface_transports {}", self.transports.join(" ")));
        }
        if let Some(adapter) = &self.adapter {
            lines.push(format!("interface {adapter}"));
        }
        if let Some(khz) = self.adapter_khz {
            lines.push(format!("adapter_khz {khz}"));
        }
        if !self.reset_config.is_empty() {
            lines.push(format!("reset_config {}", self.reset_config.join(" ")));
        }
        for (name, mask) in &self.signals {
            lines.push(format!("interface_signal add {name} {mask:#x}"));
        }
        if let Some(transport) = &self.transport {
            lines.push(format!("transport select {transport}"));
        }

        lines.extend(self.commands.iter().cloned());
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_toml() {
        let figment = Figment::from(Toml::string(
            r#"
            log_level = "DEBUG"
            log_file = "bridge.log"
            adapter = "dummy"
            transport = "swd"
            adapter_khz = 1000
            reset_config = ["srst_only", "srst_nogate"]
            commands = ["transport init", "swd idcode"]

            [signals]
            RnW = 0x100
            "#,
        ));

        let config = ToolConfig::extract(figment).unwrap();

        assert_eq!(config.log_level, Some(LevelFilter::Debug));
        assert_eq!(config.log_file, Some(PathBuf::from("bridge.log")));
        assert_eq!(config.signals.get("RnW"), Some(&0x100));
        assert_eq!(
            config.startup_commands(),
            vec![
                "interface dummy",
                "adapter_khz 1000",
                "reset_config srst_only srst_nogate",
                "interface_signal add RnW 0x100",
                "transport select swd",
                "transport init",
                "swd idcode",
            ]
        );
    }

    #[test]
    fn transports_come_before_adapter() {
        let config = ToolConfig {
            adapter: Some("dummy".to_string()),
            transports: vec!["swd".to_string(), "jtag".to_string()],
            ..Default::default()
        };

        assert_eq!(
            config.startup_commands(),
            vec!["interface_transports swd jtag", "interface dummy"]
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let figment = Figment::from(Toml::string("adaptor = \"dummy\""));

        assert!(ToolConfig::extract(figment).is_err());
    }

    #[test]
    fn empty_configuration_runs_nothing() {
        assert!(ToolConfig::default().startup_commands().is_empty());
    }
}
