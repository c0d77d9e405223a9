// ============================================================================
// config.rs — Life GPU
// Model sizes, initial-state modes, application settings and CLI parsing.
// ============================================================================

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::rules::{self, AutomatonRule};

/// Width of the control strip on the left of the window, in logical pixels.
pub const UI_WIDTH: f32 = 250.0;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unsupported model size {0} (expected 128, 256, 512 or 1024)")]
    ModelSize(u32),

    #[error("unknown initial state '{0}' (expected empty, uniform or radial)")]
    InitialMode(String),

    #[error("unknown automaton rule '{0}'")]
    Rule(String),

    #[error("missing value for {0}")]
    MissingValue(&'static str),

    #[error("invalid value '{value}' for {flag}")]
    InvalidValue { flag: &'static str, value: String },

    #[error("unknown argument '{0}'")]
    UnknownArgument(String),

    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

// ======================== Model Size ========================

/// Edge length of the square cell grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum ModelSize {
    S128,
    S256,
    S512,
    S1024,
}

impl ModelSize {
    pub const ALL: [ModelSize; 4] = [Self::S128, Self::S256, Self::S512, Self::S1024];

    pub fn texels(self) -> u32 {
        match self {
            Self::S128 => 128,
            Self::S256 => 256,
            Self::S512 => 512,
            Self::S1024 => 1024,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::S128 => "128",
            Self::S256 => "256",
            Self::S512 => "512",
            Self::S1024 => "1024",
        }
    }

    pub fn from_texels(texels: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.texels() == texels)
    }
}

impl TryFrom<u32> for ModelSize {
    type Error = ConfigError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::from_texels(value).ok_or(ConfigError::ModelSize(value))
    }
}

impl From<ModelSize> for u32 {
    fn from(size: ModelSize) -> u32 {
        size.texels()
    }
}

impl FromStr for ModelSize {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let texels: u32 = s.trim().parse().map_err(|_| ConfigError::InvalidValue {
            flag: "--size",
            value: s.to_string(),
        })?;
        Self::try_from(texels)
    }
}

impl fmt::Display for ModelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.texels();
        write!(f, "{n}x{n}")
    }
}

// ======================== Initial Mode ========================

/// How the first generation is produced after a (re)initialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialMode {
    /// Blank grid; cells are drawn with the pointer.
    Empty,
    UniformRandom,
    RadialRandom,
}

impl InitialMode {
    /// UI order.
    pub const ALL: [InitialMode; 3] = [Self::Empty, Self::RadialRandom, Self::UniformRandom];

    pub fn label(self) -> &'static str {
        match self {
            Self::Empty => "Empty / Manual draw",
            Self::UniformRandom => "Uniform Random",
            Self::RadialRandom => "Radial Random",
        }
    }

    /// Value of the `init_type` uniform in the initial-state shader.
    pub fn shader_id(self) -> u32 {
        match self {
            Self::Empty => 0,
            Self::UniformRandom => 1,
            Self::RadialRandom => 2,
        }
    }
}

impl FromStr for InitialMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "empty" | "manual" => Ok(Self::Empty),
            "uniform" | "uniform_random" => Ok(Self::UniformRandom),
            "radial" | "radial_random" => Ok(Self::RadialRandom),
            _ => Err(ConfigError::InitialMode(s.to_string())),
        }
    }
}

// ======================== Simulation Settings ========================

/// What the controller is configured with at startup.
#[derive(Clone, Copy, Debug)]
pub struct SimulationSettings {
    pub model_size: ModelSize,
    pub rule: &'static AutomatonRule,
    pub initial_mode: InitialMode,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            model_size: ModelSize::S512,
            rule: rules::DEFAULT_RULE,
            initial_mode: InitialMode::RadialRandom,
        }
    }
}

// ======================== App Config ========================

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub window_width: u32,
    pub window_height: u32,
    pub model_size: ModelSize,
    /// Rule display name or descriptor, e.g. "High Life" or "B36/S23".
    pub rule: String,
    pub initial_mode: InitialMode,
    pub vsync: bool,
    pub screenshot_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            window_width: 800,
            window_height: 600,
            model_size: ModelSize::S512,
            rule: rules::DEFAULT_RULE.name.to_string(),
            initial_mode: InitialMode::RadialRandom,
            vsync: false,
            screenshot_dir: PathBuf::from("screenshots"),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AppConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub fn simulation_settings(&self) -> Result<SimulationSettings, ConfigError> {
        let rule = rules::find_rule(&self.rule).ok_or_else(|| ConfigError::Rule(self.rule.clone()))?;
        Ok(SimulationSettings {
            model_size: self.model_size,
            rule,
            initial_mode: self.initial_mode,
        })
    }
}

// ======================== Command Line ========================

#[derive(Clone, Debug, Default)]
pub struct CliOptions {
    pub config: AppConfig,
    /// Run this many generations off-screen instead of opening a window.
    pub headless_generations: Option<u32>,
    pub seed: Option<u32>,
    pub output: Option<PathBuf>,
    pub verify: bool,
    pub show_help: bool,
}

pub const USAGE: &str = "\
Usage: life-gpu [OPTIONS]

  --config FILE        load settings from a JSON file (flags below override it)
  --size N             grid edge: 128, 256, 512 or 1024
  --rule NAME          automaton rule by name or descriptor (e.g. \"B36/S23\")
  --mode MODE          initial state: empty, uniform or radial
  --vsync              cap the frame rate to the display
  --headless N         compute N generations off-screen and exit
  --seed N             seed for the initial state in headless mode
  --out FILE.png       save the final headless generation as an image
  --verify             check every headless generation against the CPU model
  -h, --help           show this message";

pub fn parse_args<I>(args: I) -> Result<CliOptions, ConfigError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut opts = CliOptions::default();

    let mut size: Option<ModelSize> = None;
    let mut rule: Option<String> = None;
    let mut mode: Option<InitialMode> = None;
    let mut vsync = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = PathBuf::from(value(&mut args, "--config")?);
                opts.config = AppConfig::load(&path)?;
            }
            "--size" => size = Some(value(&mut args, "--size")?.parse()?),
            "--rule" => rule = Some(value(&mut args, "--rule")?),
            "--mode" => mode = Some(value(&mut args, "--mode")?.parse()?),
            "--vsync" => vsync = true,
            "--headless" => {
                opts.headless_generations = Some(number(&mut args, "--headless")?);
            }
            "--seed" => opts.seed = Some(number(&mut args, "--seed")?),
            "--out" => opts.output = Some(PathBuf::from(value(&mut args, "--out")?)),
            "--verify" => opts.verify = true,
            "-h" | "--help" => opts.show_help = true,
            other => return Err(ConfigError::UnknownArgument(other.to_string())),
        }
    }

    if let Some(size) = size {
        opts.config.model_size = size;
    }
    if let Some(rule) = rule {
        opts.config.rule = rule;
    }
    if let Some(mode) = mode {
        opts.config.initial_mode = mode;
    }
    opts.config.vsync |= vsync;

    // Fail early on an unknown rule name.
    opts.config.simulation_settings()?;
    Ok(opts)
}

fn value(args: &mut impl Iterator<Item = String>, flag: &'static str) -> Result<String, ConfigError> {
    args.next().ok_or(ConfigError::MissingValue(flag))
}

fn number(args: &mut impl Iterator<Item = String>, flag: &'static str) -> Result<u32, ConfigError> {
    let raw = value(args, flag)?;
    raw.parse()
        .map_err(|_| ConfigError::InvalidValue { flag, value: raw })
}
