//! Shared functionality for the DepthNet command line tools.

pub mod backend;
pub mod image;

pub use backend::{create_device, get_backend_name, SelectedBackend, SelectedDevice};
pub use self::image::{collect_images, normalize_min_max, ImageUtils};

use tracing_subscriber::EnvFilter;

/// Install a formatting subscriber filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
