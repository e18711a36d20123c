pub mod auth;
pub mod caption;
pub mod config;
pub mod diffusion;
pub mod generation;
pub mod storage;

pub use auth::{CurrentUserProvider, DbTokenUserProvider};
pub use caption::{CaptionApi, CaptionError, CaptionService};
pub use config::{load_config_from_file, save_config_to_file, Config};
pub use diffusion::{DiffusionApi, DiffusionError, DiffusionService};
pub use generation::{GenerationError, GenerationService};
pub use storage::{ImageStorage, StorageError};
