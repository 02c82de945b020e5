use thiserror::Error;

/// Message the endpoint returns when the selected key cannot see the model.
pub const CREDENTIAL_NOT_FOUND_MESSAGE: &str = "Requested entity was not found";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no API key available; set GEMINI_API_KEY or select a key")]
    MissingCredential,

    #[error("{message}")]
    Api {
        code: u16,
        status: Option<String>,
        reason: Option<String>,
        message: String,
    },

    /// The endpoint answered but none of the parts carried image bytes.
    #[error("{0}")]
    NoImageProduced(String),

    /// Network, body or decoding failure. Displays the whole cause chain.
    #[error("{0:#}")]
    Transport(#[from] anyhow::Error),
}

impl ClientError {
    /// Whether the failure means the current key is missing or unusable and
    /// the user should pick another one.
    ///
    /// Structured fields are checked first. An unauthorised key on a paid
    /// model is only reported through [`CREDENTIAL_NOT_FOUND_MESSAGE`].
    pub fn is_credential_error(&self) -> bool {
        match self {
            ClientError::MissingCredential => true,
            ClientError::Api {
                status,
                reason,
                message,
                ..
            } => {
                reason.as_deref() == Some("API_KEY_INVALID")
                    || status.as_deref() == Some("UNAUTHENTICATED")
                    || message.contains(CREDENTIAL_NOT_FOUND_MESSAGE)
            }
            ClientError::NoImageProduced(_) => false,
            ClientError::Transport(err) => format!("{err:#}").contains(CREDENTIAL_NOT_FOUND_MESSAGE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ClientError;

    fn api(code: u16, status: &str, reason: Option<&str>, message: &str) -> ClientError {
        ClientError::Api {
            code,
            status: Some(status.to_string()),
            reason: reason.map(str::to_string),
            message: message.to_string(),
        }
    }

    #[test]
    fn credential_errors_are_classified() {
        assert!(ClientError::MissingCredential.is_credential_error());
        assert!(api(404, "NOT_FOUND", None, "Requested entity was not found.").is_credential_error());
        assert!(api(
            400,
            "INVALID_ARGUMENT",
            Some("API_KEY_INVALID"),
            "API key not valid. Please pass a valid API key."
        )
        .is_credential_error());
        assert!(api(401, "UNAUTHENTICATED", None, "bad token").is_credential_error());
    }

    #[test]
    fn other_failures_are_not_credential_errors() {
        assert!(!api(429, "RESOURCE_EXHAUSTED", None, "Quota exceeded").is_credential_error());
        assert!(!api(404, "NOT_FOUND", None, "models/nope is not found").is_credential_error());
        assert!(!ClientError::NoImageProduced("No image was generated in the response.".to_string())
            .is_credential_error());
        assert!(!ClientError::Transport(anyhow::anyhow!("connection reset")).is_credential_error());
    }

    #[test]
    fn display_surfaces_endpoint_message_verbatim() {
        let err = api(500, "INTERNAL", None, "An internal error has occurred.");
        assert_eq!(err.to_string(), "An internal error has occurred.");
    }

    #[test]
    fn transport_display_includes_cause_chain() {
        let err = ClientError::from(
            anyhow::anyhow!("tcp connect error: Connection refused").context("Gemini request failed (endpoint)"),
        );
        assert_eq!(
            err.to_string(),
            "Gemini request failed (endpoint): tcp connect error: Connection refused"
        );
    }
}
