pub mod credentials;
pub mod memory;
pub mod rest;
