mod admin;
mod common;
mod restaurant;
