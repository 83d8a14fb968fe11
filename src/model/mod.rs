pub mod fix;
pub mod gateway;
pub mod lorawan;
pub mod object;
pub mod uplink;
