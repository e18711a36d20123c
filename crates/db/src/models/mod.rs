pub mod account;
pub mod ids;
pub mod image;
pub mod user;
