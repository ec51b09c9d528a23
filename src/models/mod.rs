mod devices;
mod wan_status;

pub use devices::*;
pub use wan_status::*;
