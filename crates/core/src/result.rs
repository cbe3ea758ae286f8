//! Result extension traits.
//!
//! Provides combinators that turn a recoverable failure into a logged
//! default, without unwrap/expect/panic.

use std::fmt::Display;

/// Extension trait providing logging combinators for Results.
///
/// Implemented for any `Result` whose error is `Display`, so the reconciler
/// and adapter error types share the same degradation helpers.
pub trait ResultExt<T> {
    /// Get the value or `T::default()`, logging the error at `warn` level.
    fn or_default_warned(self, context: &str) -> T
    where
        T: Default;
}

impl<T, E: Display> ResultExt<T> for Result<T, E> {
    fn or_default_warned(self, context: &str) -> T
    where
        T: Default,
    {
        match self {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "{context}, using default");
                T::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_or_default_warned_err() {
        let res: Result<Vec<String>, String> = Err("missing".to_string());
        assert!(res.or_default_warned("loading").is_empty());
    }

    #[test]
    fn test_or_default_warned_ok() {
        let res: Result<Vec<u8>, String> = Ok(vec![1, 2]);
        assert_eq!(res.or_default_warned("loading"), vec![1, 2]);
    }
}
