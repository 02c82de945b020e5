pub mod events;
pub mod history;
pub mod models;
pub mod options;
pub mod studio;
