pub mod acquisition;
pub mod pmtk;
