mod attr;
mod codec;
mod config;
mod control;
mod descriptor;
mod device;
mod error;
mod form;
mod monitor;
mod text;

pub use attr::*;
pub use codec::*;
pub use config::*;
pub use control::*;
pub use descriptor::*;
pub use device::*;
pub use error::{ErrorKind, Result, ZioError};
pub use form::*;
pub use monitor::*;
pub use text::*;
