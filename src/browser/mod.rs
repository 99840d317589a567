pub mod connection;
pub mod dolphin;

pub use connection::{connect_to_browser_and_page, BrowserEndpoint};
pub use dolphin::{DolphinClient, ProfileSession};
