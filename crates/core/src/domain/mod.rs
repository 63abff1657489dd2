pub mod architecture;
pub mod budget;
pub mod request;
pub mod service;
pub mod session;
