pub mod ops;
pub mod transfers;
