pub mod model_loaders;

pub use model_loaders::{load_account_middleware, load_image_middleware};
