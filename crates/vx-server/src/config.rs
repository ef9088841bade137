use serde::Deserialize;
use std::path::Path;
use vx_world::{BlockPos, WorldConfig};

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub blocks: BlocksSection,
    /// Block the residency window starts centred on.
    #[serde(default)]
    pub focus: [i32; 3],
    /// Full-save interval in seconds. 0 = disabled. Default: 300 (5 minutes).
    #[serde(default = "default_auto_save_interval")]
    pub auto_save_interval: u64,
}

fn default_auto_save_interval() -> u64 {
    300
}

#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Block type names registered at startup, in addition to air.
#[derive(Debug, Default, Deserialize)]
pub struct BlocksSection {
    #[serde(default)]
    pub names: Vec<String>,
}

impl ServerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn focus_pos(&self) -> BlockPos {
        let [x, y, z] = self.focus;
        BlockPos::new(x, y, z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_config() {
        let toml_str = r#"
            focus = [40, 64, -20]
            auto_save_interval = 60

            [world]
            directory = "saves/test"
            generator = "flat"
            load_radius = 3
            flat_layers = [
                { y = 0, block = "bedrock" },
                { y = 1, block = "dirt" },
            ]

            [logging]
            level = "debug"

            [blocks]
            names = ["bedrock", "dirt", "stone"]
        "#;
        let config: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.world.directory, std::path::PathBuf::from("saves/test"));
        assert_eq!(config.world.generator, "flat");
        assert_eq!(config.world.load_radius, 3);
        assert_eq!(config.world.flat_layers.len(), 2);
        assert_eq!(config.world.update_budget, 100_000); // default
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.blocks.names, ["bedrock", "dirt", "stone"]);
        assert_eq!(config.focus_pos(), BlockPos::new(40, 64, -20));
        assert_eq!(config.auto_save_interval, 60);
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.world.generator, "empty");
        assert_eq!(config.logging.level, "info");
        assert!(config.blocks.names.is_empty());
        assert_eq!(config.focus_pos(), BlockPos::new(0, 0, 0));
        assert_eq!(config.auto_save_interval, 300);
    }

    #[test]
    fn load_missing_file_fails() {
        let path = std::env::temp_dir().join(format!("vx_server_cfg_{}.toml", rand::random::<u64>()));
        assert!(ServerConfig::load(&path).is_err());
        std::fs::write(&path, "[logging]\nlevel = \"trace\"\n").unwrap();
        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.logging.level, "trace");
        std::fs::remove_file(&path).ok();
    }
}
