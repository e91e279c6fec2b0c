// lib.rs
// TOTP authenticator subsystem of the identity-profile console: the engine,
// the otpauth parser, and the axum/MongoDB layer that stores and serves them.

pub mod config;
pub mod models;
pub mod otpauth;
pub mod qr;
pub mod routes;
pub mod session;
pub mod state;
pub mod telemetry;
pub mod totp;
