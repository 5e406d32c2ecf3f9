pub mod class;
pub mod seed;
pub mod todo;
pub mod user;
