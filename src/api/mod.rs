pub mod apply;
pub mod health;
pub mod validation;
