//! Sensitive data marker for automatic redaction
//!
//! Connection descriptors carry addresses and credentials. Wrapping them in
//! `Sensitive<T>` keeps them out of `Debug`/`Display` output and therefore
//! out of every log line.

use std::fmt;

/// Wrapper for sensitive data that redacts itself in Debug and Display
///
/// # Example
///
/// ```
/// use entimap_core_types::Sensitive;
///
/// let dsn = Sensitive::new("Data Source=db;Password=hunter2");
/// assert_eq!(format!("{:?}", dsn), "***REDACTED***");
/// assert_eq!(dsn.expose(), &"Data Source=db;Password=hunter2");
/// ```
pub struct Sensitive<T>(T);

impl<T> Sensitive<T> {
    /// Wrap a sensitive value
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Expose the underlying value
    ///
    /// Only store connectors should need this.
    pub fn expose(&self) -> &T {
        &self.0
    }

    /// Consume the wrapper and return the inner value
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for Sensitive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***REDACTED***")
    }
}

impl<T> fmt::Display for Sensitive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***REDACTED***")
    }
}

impl<T: Clone> Clone for Sensitive<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: PartialEq> PartialEq for Sensitive<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensitive_debug_redaction() {
        let secret = Sensitive::new("Integrated Security=True;Password=pw");
        let debug_str = format!("{:?}", secret);
        assert_eq!(debug_str, "***REDACTED***");
        assert!(!debug_str.contains("Password"));
    }

    #[test]
    fn test_sensitive_display_redaction() {
        let secret = Sensitive::new("/var/lib/blogs.db");
        assert_eq!(format!("{}", secret), "***REDACTED***");
    }

    #[test]
    fn test_sensitive_into_inner() {
        let secret = Sensitive::new(String::from("blogs.db"));
        assert_eq!(secret.into_inner(), "blogs.db");
    }

    #[test]
    fn test_sensitive_in_struct_debug() {
        #[derive(Debug)]
        #[allow(dead_code)]
        struct Descriptor {
            engine: String,
            address: Sensitive<String>,
        }

        let descriptor = Descriptor {
            engine: "sqlite".to_string(),
            address: Sensitive::new("secret.db".to_string()),
        };

        let debug_str = format!("{:?}", descriptor);
        assert!(debug_str.contains("sqlite"));
        assert!(!debug_str.contains("secret.db"));
    }
}
