//! Server and pipeline configuration
//!
//! Settings come from command line flags, each backed by a `PDF_INTAKE_*`
//! environment variable.

use clap::Parser;
use std::path::PathBuf;

const DEFAULT_MAX_UPLOAD_BYTES: u64 = 16 * 1024 * 1024; // 16MB
const DEFAULT_REQUIRED_METADATA: [&str; 4] = ["Author", "Creator", "Producer", "CreationDate"];

/// Tunable parameters of the QR extraction pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct QrConfig {
    /// Contrast multiplier applied before decoding (default: 2.0)
    pub contrast_factor: f32,
    /// Width of the decode canvas in pixels (default: 300)
    pub target_width: u32,
    /// Height of the decode canvas in pixels (default: 300)
    pub target_height: u32,
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            contrast_factor: 2.0,
            target_width: 300,
            target_height: 300,
        }
    }
}

/// Storage, security and pipeline configuration for the intake server
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Flat directory holding uploaded documents (default: `uploads/`)
    pub upload_dir: PathBuf,
    /// Directory extracted images are written to (default: the upload directory)
    pub image_dir: Option<PathBuf>,
    /// Maximum accepted upload size in bytes (default: 16MB)
    pub max_upload_bytes: u64,
    /// Directories path sources are confined to (empty: no restriction)
    pub resource_dirs: Vec<String>,
    /// QR extraction parameters
    pub qr: QrConfig,
    /// Metadata fields that must carry a real value for the metadata check to pass
    pub required_metadata: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            image_dir: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            resource_dirs: Vec::new(),
            qr: QrConfig::default(),
            required_metadata: DEFAULT_REQUIRED_METADATA
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl ServerConfig {
    /// Directory extracted images are written to
    pub fn image_dir(&self) -> PathBuf {
        self.image_dir
            .clone()
            .unwrap_or_else(|| self.upload_dir.clone())
    }
}

/// PDF intake MCP server over stdio
#[derive(Parser, Debug, Clone)]
#[command(name = "pdf-intake-server", version)]
pub struct ServerArgs {
    /// Flat directory holding uploaded documents.
    #[arg(long, env = "PDF_INTAKE_UPLOAD_DIR", default_value = "uploads")]
    pub upload_dir: PathBuf,

    /// Directory extracted images are written to (default: the upload directory).
    #[arg(long, env = "PDF_INTAKE_IMAGE_DIR")]
    pub image_dir: Option<PathBuf>,

    /// Maximum accepted upload size in bytes.
    #[arg(long, env = "PDF_INTAKE_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: u64,

    /// Directories path sources are confined to, comma separated (default: no restriction).
    #[arg(long = "resource-dir", env = "PDF_INTAKE_RESOURCE_DIRS", value_delimiter = ',')]
    pub resource_dirs: Vec<String>,

    /// Contrast multiplier applied before barcode decoding.
    #[arg(long, env = "PDF_INTAKE_QR_CONTRAST", default_value_t = 2.0, value_parser = parse_contrast)]
    pub qr_contrast: f32,

    /// Decode canvas size as WIDTHxHEIGHT.
    #[arg(long, env = "PDF_INTAKE_QR_SIZE", default_value = "300x300", value_parser = parse_size)]
    pub qr_size: (u32, u32),

    /// Metadata fields that must carry a value, comma separated.
    #[arg(
        long,
        env = "PDF_INTAKE_REQUIRED_METADATA",
        value_delimiter = ',',
        default_values = DEFAULT_REQUIRED_METADATA,
        value_parser = parse_field_name
    )]
    pub required_metadata: Vec<String>,
}

impl From<ServerArgs> for ServerConfig {
    fn from(args: ServerArgs) -> Self {
        let (target_width, target_height) = args.qr_size;
        Self {
            upload_dir: args.upload_dir,
            image_dir: args.image_dir,
            max_upload_bytes: args.max_upload_bytes,
            resource_dirs: args
                .resource_dirs
                .into_iter()
                .filter(|dir| !dir.trim().is_empty())
                .collect(),
            qr: QrConfig {
                contrast_factor: args.qr_contrast,
                target_width,
                target_height,
            },
            required_metadata: args
                .required_metadata
                .into_iter()
                .filter(|field| !field.is_empty())
                .collect(),
        }
    }
}

fn parse_contrast(value: &str) -> Result<f32, String> {
    value
        .trim()
        .parse::<f32>()
        .ok()
        .filter(|f| f.is_finite() && *f > 0.0)
        .ok_or_else(|| format!("expected a positive number, got {:?}", value))
}

/// Parse `WIDTHxHEIGHT`, e.g. `300x300`
fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let invalid = || format!("expected WIDTHxHEIGHT, got {:?}", value);

    let (width, height) = value.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
    let width: u32 = width.trim().parse().map_err(|_| invalid())?;
    let height: u32 = height.trim().parse().map_err(|_| invalid())?;

    if width == 0 || height == 0 {
        return Err(invalid());
    }

    Ok((width, height))
}

fn parse_field_name(value: &str) -> Result<String, String> {
    Ok(value.trim().to_string())
}
