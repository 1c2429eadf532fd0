//! Core utilities shared across the domain

pub mod string;
