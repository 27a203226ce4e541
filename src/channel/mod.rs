//! Channel module - Fixed-layout shared memory between the bridge and the strategy

pub mod layout;
pub mod shm;

pub use layout::{ChannelLayout, DEFAULT_REGION_SIZE, LAYOUT_SIZE};
pub use shm::{SharedChannel, DEFAULT_SHM_DIR};
