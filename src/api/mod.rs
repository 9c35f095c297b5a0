pub mod auth;
pub mod cards;
pub mod cart;
pub mod content;
pub mod notifications;
pub mod payments;
pub mod products;
pub mod quizzes;
pub mod study;
pub mod users;
