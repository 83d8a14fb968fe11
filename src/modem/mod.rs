pub mod rak811;
pub mod supervisor;
pub mod transport;
