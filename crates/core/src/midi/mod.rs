pub mod device;
pub mod midi;
pub mod virtual_device;
