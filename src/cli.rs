use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tagvault")]
#[command(author, version, about = "Cached EXIF/IPTC/XMP metadata pipeline for photo libraries")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch metadata records for a batch of files
    Fetch {
        /// Files to fetch
        #[arg(required = true)]
        paths: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Scan a directory and fetch metadata for every image in it
    Scan {
        /// Directory to scan
        #[arg(required = true)]
        dir: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the full raw tag map for a single file
    Detail {
        /// File to inspect
        #[arg(required = true)]
        path: String,
    },

    /// Set the star rating (0-5) for a file
    Rate {
        /// File to rate
        #[arg(required = true)]
        path: String,

        /// Rating value, 0 through 5
        #[arg(required = true)]
        rating: i64,
    },

    /// Set the color label for a file (empty string clears it)
    Label {
        /// File to label
        #[arg(required = true)]
        path: String,

        /// Label value
        #[arg(required = true)]
        label: String,
    },

    /// Rotate a file by rewriting its EXIF orientation
    Rotate {
        /// File to rotate
        #[arg(required = true)]
        path: String,

        /// Rotation direction
        #[arg(value_enum)]
        direction: RotationArg,

        /// The pixel data was already rotated; reset orientation to 1
        #[arg(long)]
        physical: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RotationArg {
    /// Quarter turn clockwise
    Cw,
    /// Quarter turn counterclockwise
    Ccw,
    /// Half turn
    Half,
}

impl From<RotationArg> for tagvault::write::Rotation {
    fn from(arg: RotationArg) -> Self {
        match arg {
            RotationArg::Cw => Self::Clockwise,
            RotationArg::Ccw => Self::CounterClockwise,
            RotationArg::Half => Self::Half,
        }
    }
}
