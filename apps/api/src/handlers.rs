pub mod documents;
pub mod health;
pub mod role_assignments;
