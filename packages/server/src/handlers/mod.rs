pub mod admin;
pub mod health;
pub mod restaurant;
pub mod review;
