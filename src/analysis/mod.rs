pub mod network;
pub mod privilege;
