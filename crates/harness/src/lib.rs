pub mod device;
pub mod network;
pub mod records;

pub use device::TestDevice;
pub use network::TestNetwork;
