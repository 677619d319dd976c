//! The `Result` alias shared by the tradeportal crates.
//!
//! Errors are `rootcause` reports over a typed context. Storage failures
//! start as `StorageError`, become `SessionError` in the session store and
//! `ApiError` at the API wrapper, each layer wrapping the one below with
//! `Report::context` so the full chain is kept for logging.

use rootcause::Report;

/// `Result` whose error is a [`Report`] with current context `C`.
///
/// `?` lifts a bare `C` into a report, so functions can return
/// `Err(MyError { .. }.into())` or propagate with `?`.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Boom;

    impl std::fmt::Display for Boom {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "boom")
        }
    }

    impl std::error::Error for Boom {}

    fn fails() -> Result<(), Boom> {
        Err::<(), _>(Boom)?;
        Ok(())
    }

    #[test]
    fn result_type_works() {
        let ok: Result<i32> = Ok(42);
        assert_eq!(ok.expect("should be ok"), 42);
    }

    #[test]
    fn typed_context_survives_question_mark() {
        let err = fails().expect_err("should fail");
        assert_eq!(err.current_context().to_string(), "boom");
    }
}
