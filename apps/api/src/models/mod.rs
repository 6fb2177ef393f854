pub mod notice;
pub mod portfolio;
