//! API request handlers

pub mod campaigns;
pub mod contact_lists;
pub mod contacts;
pub mod health;
pub mod quota;
pub mod whatsapp;

pub use health::*;
