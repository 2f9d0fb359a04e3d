//! Background services and collaborator boundaries

pub mod generation;
pub mod worker;
