// Blog content — post administration and blog-wide settings.

pub mod posts;
pub mod settings;

pub use posts::{estimate_read_time, make_excerpt, normalize_tags, PostAdmin};
pub use settings::{load_settings, save_settings};
