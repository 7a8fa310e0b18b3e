mod audit;
mod directory;
mod image_repo;
mod role_binding;
mod user;

pub use audit::*;
pub use directory::*;
pub use image_repo::*;
pub use role_binding::*;
pub use user::*;
