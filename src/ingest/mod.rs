pub mod antratek;
pub mod chirpstack;
pub mod common;
pub mod decoder;
pub mod g62;
pub mod irnas;
pub mod rpi;
