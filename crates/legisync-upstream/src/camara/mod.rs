//! Chamber of Deputies open-data API (`dadosabertos.camara.leg.br`).

pub mod client;
pub mod dto;

pub use client::CamaraClient;
