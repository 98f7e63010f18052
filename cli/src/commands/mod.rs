pub mod admin;
pub mod event;
pub mod health;
pub mod person;
