/// Convenience result type used across Kinetype.
pub type KinetypeResult<T> = Result<T, KinetypeError>;

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum KinetypeError {
    /// Invalid request or configuration data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown or out-of-contract animation style ids.
    #[error("style error: {0}")]
    Style(String),

    /// Errors while rasterizing text into pixel buffers.
    #[error("render error: {0}")]
    Render(String),

    /// Errors while building the palette or emitting GIF bytes.
    #[error("encode error: {0}")]
    Encode(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl KinetypeError {
    /// Build a [`KinetypeError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`KinetypeError::Style`] value.
    pub fn style(msg: impl Into<String>) -> Self {
        Self::Style(msg.into())
    }

    /// Build a [`KinetypeError::Render`] value.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build a [`KinetypeError::Encode`] value.
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// True when the error should map to a client-facing rejection rather
    /// than an internal generation failure.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Style(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            KinetypeError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(KinetypeError::style("x").to_string().contains("style error:"));
        assert!(
            KinetypeError::render("x")
                .to_string()
                .contains("render error:")
        );
        assert!(
            KinetypeError::encode("x")
                .to_string()
                .contains("encode error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = KinetypeError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn rejection_split_matches_error_kinds() {
        assert!(KinetypeError::validation("x").is_rejection());
        assert!(KinetypeError::style("x").is_rejection());
        assert!(!KinetypeError::render("x").is_rejection());
        assert!(!KinetypeError::encode("x").is_rejection());
    }
}
