pub mod dialogue;
pub mod health;
pub mod providers;
