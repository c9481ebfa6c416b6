pub mod debug;
mod health;
mod proxy;

pub use health::{health_check, index, status};
pub use proxy::proxy;
