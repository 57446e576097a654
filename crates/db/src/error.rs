//! Translation of `sqlx` failures into [`AdvSuggestError`].

use advsuggest_core::{AdvSuggestError, ErrorKind};

/// SQLSTATE `query_canceled` (statement timeout or server-side cancel).
const QUERY_CANCELED: &str = "57014";

/// Classify a `sqlx` error, tagging it with the failing `operation`.
///
/// | `sqlx` error                                   | Variant          |
/// |------------------------------------------------|------------------|
/// | I/O, TLS, protocol, pool timeout/closed, `08*` | `Connection`     |
/// | column/row decode, unknown type or column      | `DecodeMismatch` |
/// | SQLSTATE `23*` (integrity), `22*` (data)       | `Constraint`     |
/// | SQLSTATE `57014`                               | `Canceled`       |
/// | anything else                                  | `Storage`        |
pub fn classify(operation: &'static str, err: sqlx::Error) -> AdvSuggestError {
    match &err {
        sqlx::Error::Database(db) => {
            let kind = db.code().map_or(ErrorKind::Storage, |code| sqlstate_kind(&code));
            match kind {
                ErrorKind::Constraint => AdvSuggestError::constraint(operation, err),
                ErrorKind::Canceled => AdvSuggestError::canceled(operation),
                ErrorKind::Connection => AdvSuggestError::connection(operation, err),
                _ => AdvSuggestError::storage(operation, err),
            }
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => AdvSuggestError::connection(operation, err),
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnIndexOutOfBounds { .. } => {
            AdvSuggestError::decode(operation, err.to_string())
        }
        _ => AdvSuggestError::storage(operation, err),
    }
}

/// Error kind for a server-reported SQLSTATE code.
pub fn sqlstate_kind(code: &str) -> ErrorKind {
    match code {
        QUERY_CANCELED => ErrorKind::Canceled,
        c if c.starts_with("23") || c.starts_with("22") => ErrorKind::Constraint,
        c if c.starts_with("08") => ErrorKind::Connection,
        _ => ErrorKind::Storage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn sqlstate_codes_map_to_kinds() {
        // unique_violation, check_violation, string_data_right_truncation,
        // sequence_generator_limit_exceeded
        for code in ["23505", "23514", "22001", "2200H"] {
            assert_eq!(sqlstate_kind(code), ErrorKind::Constraint, "{code}");
        }
        assert_eq!(sqlstate_kind("57014"), ErrorKind::Canceled);
        assert_eq!(sqlstate_kind("08006"), ErrorKind::Connection);
        assert_eq!(sqlstate_kind("08001"), ErrorKind::Connection);
        // admin_shutdown sits outside class 08
        assert_eq!(sqlstate_kind("57P01"), ErrorKind::Storage);
        assert_eq!(sqlstate_kind("42P01"), ErrorKind::Storage);
        assert_eq!(sqlstate_kind(""), ErrorKind::Storage);
    }

    #[test]
    fn transport_failures_are_connection_errors() {
        let io = sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert_eq!(classify("add", io).kind(), ErrorKind::Connection);
        assert_eq!(classify("add", sqlx::Error::PoolTimedOut).kind(), ErrorKind::Connection);
        assert_eq!(classify("add", sqlx::Error::PoolClosed).kind(), ErrorKind::Connection);
    }

    #[test]
    fn decode_failures_are_decode_mismatches() {
        let err = classify(
            "get_list_adv_suggest",
            sqlx::Error::ColumnNotFound("queries".into()),
        );
        assert_matches!(
            err,
            AdvSuggestError::DecodeMismatch { operation: "get_list_adv_suggest", ref reason }
                if reason.contains("queries")
        );

        let err = classify("get_list_adv_suggest", sqlx::Error::Decode("bad array literal".into()));
        assert_eq!(err.kind(), ErrorKind::DecodeMismatch);
    }

    #[test]
    fn other_failures_are_storage_errors() {
        let err = classify("change_state_adv_suggest_by_id", sqlx::Error::RowNotFound);
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert_eq!(err.operation(), "change_state_adv_suggest_by_id");
    }
}
