pub mod commands;

use clap::ValueEnum;
use loadout_core::settings::DeployMode;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliDeployMode {
    Link,
    Copy,
}

impl From<CliDeployMode> for DeployMode {
    fn from(value: CliDeployMode) -> Self {
        match value {
            CliDeployMode::Link => DeployMode::Link,
            CliDeployMode::Copy => DeployMode::Copy,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliToggle {
    On,
    Off,
}

impl CliToggle {
    pub fn as_bool(self) -> bool {
        matches!(self, CliToggle::On)
    }
}
