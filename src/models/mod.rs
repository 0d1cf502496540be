pub mod api;
pub mod credential;
pub mod proxy;
pub mod video;

pub use api::*;
pub use credential::*;
pub use proxy::*;
pub use video::*;
