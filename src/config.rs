//! Configuration for MBTiles Streamer.
//!
//! Settings come from command-line arguments, with `MBTILES_`-prefixed
//! environment variables as fallback and defaults for everything.
//!
//! # Environment Variables
//!
//! - `MBTILES_HOST` - Server bind address (default: 0.0.0.0)
//! - `MBTILES_PORT` - Server port (default: 8080)
//! - `MBTILES_UPLOAD_DIR` - Archive directory, scanned at startup (default: ./mbtiles)
//! - `MBTILES_MAX_FILE_SIZE` - Upload limit in MiB (default: 100)
//! - `MBTILES_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 3600)
//! - `MBTILES_CORS_ORIGINS` - Allowed CORS origins, comma-separated (default: any)

use std::path::PathBuf;

use clap::Parser;

use crate::server::{RouterConfig, DEFAULT_MAX_FILE_SIZE_MIB};

// =============================================================================
// Default Values
// =============================================================================

pub const DEFAULT_HOST: &str = "0.0.0.0";

pub const DEFAULT_PORT: u16 = 8080;

/// Default directory for stored archives.
pub const DEFAULT_UPLOAD_DIR: &str = "./mbtiles";

/// Default HTTP cache max-age in seconds (1 hour).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

// =============================================================================
// CLI Arguments
// =============================================================================

/// MBTiles Streamer - a tile server for MBTiles archives.
///
/// Loads every `.mbtiles` file in the upload directory at startup, accepts
/// new archives over HTTP and serves their tiles and metadata.
#[derive(Parser, Debug, Clone)]
#[command(name = "mbtiles-streamer")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "MBTILES_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "MBTILES_PORT")]
    pub port: u16,

    // =========================================================================
    // Storage Configuration
    // =========================================================================
    /// Directory holding archives; scanned at startup and receives uploads.
    #[arg(long, default_value = DEFAULT_UPLOAD_DIR, env = "MBTILES_UPLOAD_DIR")]
    pub upload_dir: PathBuf,

    /// Maximum upload size in MiB.
    #[arg(long, default_value_t = DEFAULT_MAX_FILE_SIZE_MIB, env = "MBTILES_MAX_FILE_SIZE")]
    pub max_file_size: u64,

    // =========================================================================
    // HTTP Configuration
    // =========================================================================
    /// HTTP Cache-Control max-age for tiles, in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "MBTILES_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "MBTILES_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("port must be greater than 0".to_string());
        }

        if self.upload_dir.as_os_str().is_empty() {
            return Err(
                "Upload directory is required. Set --upload-dir or MBTILES_UPLOAD_DIR".to_string(),
            );
        }

        if self.max_file_size == 0 {
            return Err("max_file_size must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Router settings derived from this configuration.
    pub fn router_config(&self) -> RouterConfig {
        let mut router_config = RouterConfig::new(self.upload_dir.clone())
            .with_max_file_size_mib(self.max_file_size)
            .with_cache_max_age(self.cache_max_age)
            .with_tracing(!self.no_tracing);

        if let Some(ref origins) = self.cors_origins {
            router_config = router_config.with_cors_origins(origins.clone());
        }

        router_config
    }
}

// =============================================================================
// Tests
// =============================================================================
