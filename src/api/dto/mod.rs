//! Data Transfer Objects for REST request/response serialization.

pub mod participant_dto;

pub use participant_dto::*;
