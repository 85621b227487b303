#![cfg_attr(not(test), no_std)]

pub mod hrm;

pub use num_enum;
