mod client;

pub use client::{HttpClient, hash_bytes};
