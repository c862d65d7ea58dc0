mod device;
mod license;

pub use device::*;
pub use license::*;
