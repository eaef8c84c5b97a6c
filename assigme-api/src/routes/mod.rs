pub mod annonces;
pub mod auth;
pub mod calls;
pub mod categories;
pub mod conversations;
pub mod favoris;
pub mod health;
pub mod images;
