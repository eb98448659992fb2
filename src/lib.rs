pub mod config;
pub mod decode;
pub mod error;
pub mod events;
pub mod host;
pub mod last_folder;
pub mod light;
pub mod panel;
pub mod scan;
pub mod session;
pub mod tasks {
    pub mod pool;
    pub mod thumbnail;
}

pub use config::Configuration;
pub use error::{DecodeError, Error, HostError};
pub use host::{HostIntegration, NoHost, SceneGraph};
pub use panel::BrowserPanel;
pub use session::{BrowseSession, ImageItem, ItemState, Status, StatusTone};
