use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;

/// Grid configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    pub n: usize,    // Points per axis
    pub length: f64, // Physical side length of the periodic domain
}

impl GridConfig {
    pub fn dx(&self) -> f64 {
        self.length / self.n as f64
    }

    fn validate(&self) -> Result<()> {
        if self.n < 4 {
            return Err(anyhow!(
                "grid.n must be at least 4 so the seed blobs land on distinct cells, got {}",
                self.n
            ));
        }
        if !self.length.is_finite() || self.length <= 0.0 {
            return Err(anyhow!("grid.length must be positive, got {}", self.length));
        }
        Ok(())
    }
}

/// Time stepping and field-coupling parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicsConfig {
    pub dt: f64,
    pub steps: usize,
    #[serde(default = "default_gravity_strength")]
    pub gravity_strength: f64,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f64,
}

fn default_gravity_strength() -> f64 {
    0.01
}

fn default_learning_rate() -> f64 {
    5.0
}

fn default_decay_rate() -> f64 {
    0.001
}

impl PhysicsConfig {
    fn validate(&self) -> Result<()> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(anyhow!("physics.dt must be positive, got {}", self.dt));
        }
        if self.steps == 0 {
            return Err(anyhow!("physics.steps must be at least 1"));
        }
        if self.gravity_strength < 0.0 {
            return Err(anyhow!(
                "physics.gravity_strength must be non-negative, got {}",
                self.gravity_strength
            ));
        }
        if self.learning_rate < 0.0 {
            return Err(anyhow!(
                "physics.learning_rate must be non-negative, got {}",
                self.learning_rate
            ));
        }
        if self.decay_rate < 0.0 {
            return Err(anyhow!(
                "physics.decay_rate must be non-negative, got {}",
                self.decay_rate
            ));
        }
        Ok(())
    }
}

/// Initial-condition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitConfig {
    #[serde(default = "default_noise_amplitude")]
    pub noise_amplitude: f64,
    /// RNG seed; drawn from entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_noise_amplitude() -> f64 {
    0.05
}

impl Default for InitConfig {
    fn default() -> Self {
        InitConfig {
            noise_amplitude: default_noise_amplitude(),
            seed: None,
        }
    }
}

impl InitConfig {
    fn validate(&self) -> Result<()> {
        if !self.noise_amplitude.is_finite() || self.noise_amplitude < 0.0 {
            return Err(anyhow!(
                "init.noise_amplitude must be non-negative, got {}",
                self.noise_amplitude
            ));
        }
        Ok(())
    }
}

/// Visualisation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualisationConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_image_width")]
    pub image_width: u32,
    #[serde(default = "default_image_height")]
    pub image_height: u32,
    #[serde(default = "default_frame_every")]
    pub frame_every: usize,
    #[serde(default = "default_report_every")]
    pub report_every: usize,
}

fn default_output_dir() -> String {
    "output".to_string()
}

fn default_image_width() -> u32 {
    1800
}

fn default_image_height() -> u32 {
    700
}

fn default_frame_every() -> usize {
    10
}

fn default_report_every() -> usize {
    100
}

impl Default for VisualisationConfig {
    fn default() -> Self {
        VisualisationConfig {
            output_dir: default_output_dir(),
            image_width: default_image_width(),
            image_height: default_image_height(),
            frame_every: default_frame_every(),
            report_every: default_report_every(),
        }
    }
}

impl VisualisationConfig {
    fn validate(&self) -> Result<()> {
        if self.image_width == 0 || self.image_height == 0 {
            return Err(anyhow!(
                "image dimensions must be positive (width={}, height={})",
                self.image_width,
                self.image_height
            ));
        }
        if self.frame_every == 0 {
            return Err(anyhow!("visualisation.frame_every must be at least 1"));
        }
        if self.report_every == 0 {
            return Err(anyhow!("visualisation.report_every must be at least 1"));
        }
        Ok(())
    }
}

/// Complete simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub grid: GridConfig,
    pub physics: PhysicsConfig,
    #[serde(default)]
    pub init: InitConfig,
    #[serde(default)]
    pub visualisation: VisualisationConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config file '{}': {}", path, e))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| anyhow!("Failed to parse TOML config: {}", e))?;

        config.validate()?;

        Ok(config)
    }

    /// The default run: a 200x200 grid over a domain of length 100, 1500
    /// steps of dt=0.005 with gentle gravity and slow nonlinearity decay.
    pub fn builtin() -> Self {
        Config {
            grid: GridConfig {
                n: 200,
                length: 100.0,
            },
            physics: PhysicsConfig {
                dt: 0.005,
                steps: 1500,
                gravity_strength: default_gravity_strength(),
                learning_rate: default_learning_rate(),
                decay_rate: default_decay_rate(),
            },
            init: InitConfig::default(),
            visualisation: VisualisationConfig::default(),
        }
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<()> {
        self.grid.validate()?;
        self.physics.validate()?;
        self.init.validate()?;
        self.visualisation.validate()?;

        // Advisory only: the explicit scheme is prone to blow-up once dt
        // approaches the grid spacing. Divergence is an accepted property of
        // the model, so this never rejects a run.
        let dx = self.grid.dx();
        if self.physics.dt > 0.5 * dx {
            eprintln!(
                "Warning: dt={} exceeds 0.5*dx={}; the leapfrog update may diverge",
                self.physics.dt,
                0.5 * dx
            );
        }

        Ok(())
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("=== Simulation Configuration ===");
        println!(
            "Grid: {}x{} over a {} x {} periodic domain (dx={})",
            self.grid.n,
            self.grid.n,
            self.grid.length,
            self.grid.length,
            self.grid.dx()
        );
        println!(
            "Physics: dt={}, steps={}, total_time={}",
            self.physics.dt,
            self.physics.steps,
            self.physics.steps as f64 * self.physics.dt
        );
        println!(
            "Coupling: gravity={}, learning_rate={}, decay_rate={}",
            self.physics.gravity_strength, self.physics.learning_rate, self.physics.decay_rate
        );
        match self.init.seed {
            Some(seed) => println!(
                "Init: noise amplitude {}, seed {}",
                self.init.noise_amplitude, seed
            ),
            None => println!(
                "Init: noise amplitude {}, seed from entropy",
                self.init.noise_amplitude
            ),
        }
        println!(
            "Visualisation: {}x{} PNG every {} steps -> {}/",
            self.visualisation.image_width,
            self.visualisation.image_height,
            self.visualisation.frame_every,
            self.visualisation.output_dir
        );
        println!("================================");
    }
}
