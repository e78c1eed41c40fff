pub mod appointments;
pub mod auth;
pub mod checkin;
pub mod health;
pub mod patients;
pub mod root;
