pub mod template_loader;

pub use template_loader::{load_template, template_path};
