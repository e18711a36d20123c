pub mod account;
pub mod image;
pub mod user;
