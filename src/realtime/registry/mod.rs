pub mod actor;
pub mod handle;
pub mod message;

pub use handle::RegistryHandle;
pub use message::RegistryMessage;
