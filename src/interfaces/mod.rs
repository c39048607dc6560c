pub mod csv;
pub mod seed;
