pub mod codec;
pub mod controller;
pub mod credentials;
pub mod download;
pub mod error;
pub mod gemini;

pub use controller::{ActionOutcome, PendingAction, SessionController, SessionState};
pub use credentials::{CredentialHost, KeyStore};
pub use error::ClientError;
pub use gemini::{GeminiClient, GenerateOptions, GeneratedImage, ImageClient};
