use std::net::ToSocketAddrs;

use crate::config::models::ProxyConfig;

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone)]
pub enum ValidationError {
    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid bind address '{address}': {reason}")]
    InvalidBindAddress { address: String, reason: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Proxy configuration validator
pub struct ProxyConfigValidator;

impl ProxyConfigValidator {
    /// Validate the entire proxy configuration
    pub fn validate(config: &ProxyConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_target_url(&config.target_url) {
            errors.push(e);
        }

        if let Err(e) = Self::validate_timeout("connect_timeout_secs", config.connect_timeout_secs)
        {
            errors.push(e);
        }

        if let Err(e) = Self::validate_timeout("read_timeout_secs", config.read_timeout_secs) {
            errors.push(e);
        }

        if let Err(e) = Self::validate_bind_address(&config.host, config.port) {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    /// Validate the upstream target URL
    fn validate_target_url(url_str: &str) -> ValidationResult<()> {
        match url::Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    return Err(ValidationError::InvalidField {
                        field: "target_url".to_string(),
                        message: format!(
                            "URL scheme must be 'http' or 'https', got '{}'",
                            url.scheme()
                        ),
                    });
                }

                if url.host().is_none() {
                    return Err(ValidationError::InvalidField {
                        field: "target_url".to_string(),
                        message: "URL must have a valid host".to_string(),
                    });
                }

                Ok(())
            }
            Err(e) => Err(ValidationError::InvalidField {
                field: "target_url".to_string(),
                message: format!("Invalid URL format: {e}"),
            }),
        }
    }

    /// Validate a timeout value: must be a finite number of seconds greater than zero
    fn validate_timeout(field: &str, value: f64) -> ValidationResult<()> {
        if !value.is_finite() {
            return Err(ValidationError::InvalidField {
                field: field.to_string(),
                message: "Timeout must be a finite number of seconds".to_string(),
            });
        }

        if value <= 0.0 {
            return Err(ValidationError::InvalidField {
                field: field.to_string(),
                message: format!("Timeout must be greater than 0, got {value}"),
            });
        }

        Ok(())
    }

    /// Validate the listen address. Hostnames are resolved rather than parsed
    /// so values like "localhost" work the same way they do at bind time.
    fn validate_bind_address(host: &str, port: u16) -> ValidationResult<()> {
        if host.trim().is_empty() {
            return Err(ValidationError::InvalidBindAddress {
                address: format!(":{port}"),
                reason: "Host cannot be empty".to_string(),
            });
        }

        if let Err(e) = (host, port).to_socket_addrs() {
            return Err(ValidationError::InvalidBindAddress {
                address: format!("{host}:{port}"),
                reason: format!("Does not resolve to a socket address: {e}"),
            });
        }

        Ok(())
    }

    /// Format multiple validation errors into a single message
    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        if errors.is_empty() {
            return "No errors".to_string();
        }

        if errors.len() == 1 {
            return errors[0].to_string();
        }

        let mut message = format!("Found {} validation errors:\n", errors.len());
        for (i, error) in errors.iter().enumerate() {
            message.push_str(&format!("  {}. {}\n", i + 1, error));
        }
        message
    }
}
