pub mod health;
pub mod projects;
pub mod users;
