pub mod currency;
pub mod sort;
pub mod store;
