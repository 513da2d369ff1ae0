pub mod gate;
pub mod id_location;

pub use gate::{AuthGate, LoginGuard, OwnershipGuard};
pub use id_location::{BufferedBody, IdLocation};
