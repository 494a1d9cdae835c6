use clap::Parser;
use imgstream::config;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "imgstream")]
#[command(version)]
#[command(about = "Stream desktop images through a push capture source", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/imgstream.toml")]
    pub config: PathBuf,

    /// Capture locator (e.g. imgstreaming:0)
    #[arg(short, long)]
    pub locator: Option<String>,

    /// X11 display name
    #[arg(short, long)]
    pub display: Option<String>,

    /// Resolution to negotiate (e.g. 352x288)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Frame rate when the format leaves it open
    #[arg(long)]
    pub frame_rate: Option<f32>,

    /// Number of buffers to receive before stopping
    #[arg(short = 'n', long, default_value = "30")]
    pub frames: u64,

    /// Seconds to wait for a single buffer
    #[arg(long, default_value = "5")]
    pub timeout: u64,

    /// Print capture info as JSON and exit
    #[arg(long, action)]
    pub info: bool,

    /// Verbose logging
    #[arg(short, long, action)]
    pub verbose: bool,
}

impl Args {
    pub fn load_config(&self) -> Result<config::Config, Box<dyn std::error::Error>> {
        config::Config::load(&self.config)
    }

    /// Apply command line overrides on top of the file configuration
    pub fn apply_overrides(&self, config: &mut config::Config) {
        if let Some(ref locator) = self.locator {
            config.capture.locator = locator.clone();
        }
        if let Some(ref display) = self.display {
            config.capture.display = display.clone();
        }
        if let Some(ref format) = self.format {
            config.capture.format = Some(format.clone());
        }
        if let Some(rate) = self.frame_rate {
            config.stream.frame_rate = rate;
        }
    }
}
