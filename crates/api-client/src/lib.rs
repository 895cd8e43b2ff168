pub mod client;
pub mod credentials;

pub use client::ApiClient;
pub use credentials::CredentialStore;
pub use watchpost_api;
