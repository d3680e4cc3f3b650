pub mod auth;
pub mod counter;
pub mod health;
pub mod pages;
