//! Secret redaction for log output.

/// Mask a secret, keeping a short prefix as a hint: `"abcd***"`.
///
/// Secrets of four characters or fewer are fully masked.
pub fn redact_secret(secret: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }
    if secret.chars().count() > 4 {
        format!("{}***", secret.chars().take(4).collect::<String>())
    } else {
        "***".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_short_hint() {
        assert_eq!(redact_secret("MTIzNDU2Nzg5.abc.def"), "MTIz***");
    }

    #[test]
    fn short_secrets_fully_masked() {
        assert_eq!(redact_secret("abc"), "***");
        assert_eq!(redact_secret(""), "");
    }
}
