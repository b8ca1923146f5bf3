pub mod dto;
pub(crate) mod extractors;
pub mod jwt;
pub mod password;
pub mod services;
