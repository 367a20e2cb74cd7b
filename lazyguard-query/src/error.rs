//! Error types for query and guard operations with actionable messages.
//!
//! Every error carries:
//! - An error code for programmatic handling
//! - Context about the model and field involved
//! - Suggestions for fixing the originating query
//!
//! # Error Codes
//!
//! Error codes follow a pattern: P{category}{number}
//! - 10xx: Query errors (not found, invalid filter, invalid select)
//! - 11xx: Guard errors (an access would have issued an extra query)
//! - 5xxx: Execution errors (invalid parameters)
//! - 7xxx: Configuration errors
//! - 9xxx: Internal errors
//!
//! ```rust
//! use lazyguard_query::{ErrorCode, QueryError};
//! use lazyguard_schema::RelationKind;
//!
//! let err = QueryError::missing_relation_field(
//!     "User",
//!     "role",
//!     "Role",
//!     RelationKind::ForwardManyToOne,
//!     Some("role_id"),
//! );
//! assert_eq!(err.code, ErrorCode::MissingRelationField);
//! assert!(err.is_missing_relation());
//! assert!(err.to_string().starts_with("[P1102] Access to `User.role` was prevented."));
//! ```

use lazyguard_schema::RelationKind;
use std::fmt;
use thiserror::Error;

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Query errors (10xx)
    /// Record not found (P1001).
    RecordNotFound = 1001,
    /// Multiple records found when expecting one (P1002).
    NotUnique = 1002,
    /// Invalid filter or where clause (P1003).
    InvalidFilter = 1003,
    /// Invalid select or include (P1004).
    InvalidSelect = 1004,
    /// Required field missing (P1005).
    RequiredFieldMissing = 1005,

    // Guard errors (11xx)
    /// Read of a field excluded by `only`/`defer` (P1101).
    MissingLocalField = 1101,
    /// Read of a singular relation that was not eager-loaded (P1102).
    MissingRelationField = 1102,
    /// Read of a collection relation that was not prefetched (P1103).
    MissingReverseRelationField = 1103,
    /// Refinement of an already prefetched collection (P1104).
    BlockedMethod = 1104,
    /// Relation access on a record whose identity was not loaded (P1105).
    AmbiguousIdentity = 1105,

    // Query execution errors (5xxx)
    /// Invalid parameter (P5003).
    InvalidParameter = 5003,

    // Configuration errors (7xxx)
    /// Invalid configuration (P7001).
    InvalidConfiguration = 7001,

    // Internal errors (9xxx)
    /// Internal error (P9001).
    Internal = 9001,
}

impl ErrorCode {
    /// Get the error code string (e.g., "P1001").
    pub fn code(&self) -> String {
        format!("P{}", *self as u16)
    }

    /// Get a short description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::RecordNotFound => "Record not found",
            Self::NotUnique => "Multiple records found",
            Self::InvalidFilter => "Invalid filter condition",
            Self::InvalidSelect => "Invalid select or include",
            Self::RequiredFieldMissing => "Required field missing",
            Self::MissingLocalField => "Access to an unloaded field",
            Self::MissingRelationField => "Access to an unloaded relation",
            Self::MissingReverseRelationField => "Access to an unprefetched collection",
            Self::BlockedMethod => "Query on a prefetched collection",
            Self::AmbiguousIdentity => "Relation access without a loaded identity",
            Self::InvalidParameter => "Invalid parameter",
            Self::InvalidConfiguration => "Invalid configuration",
            Self::Internal => "Internal error",
        }
    }

    /// Check if this code belongs to the guard range.
    pub fn is_guard(&self) -> bool {
        (1101..1200).contains(&(*self as u16))
    }

    /// Get the documentation URL for this error.
    pub fn docs_url(&self) -> String {
        format!(
            "https://github.com/pegasusheavy/lazyguard#{}",
            self.code().to_lowercase()
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Suggestion for fixing an error.
#[derive(Debug, Clone)]
pub struct Suggestion {
    /// The suggestion text.
    pub text: String,
    /// Optional code example.
    pub code: Option<String>,
}

impl Suggestion {
    /// Create a new suggestion.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            code: None,
        }
    }

    /// Add a code example.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Additional context for an error.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation that was being performed.
    pub operation: Option<String>,
    /// The model involved.
    pub model: Option<String>,
    /// The field or relation involved.
    pub field: Option<String>,
    /// The SQL statement (if available).
    pub sql: Option<String>,
    /// Suggestions for fixing the error.
    pub suggestions: Vec<Suggestion>,
    /// Help text.
    pub help: Option<String>,
}

/// Errors that can occur during query operations and guarded accesses.
#[derive(Error, Debug)]
pub struct QueryError {
    /// The error code.
    pub code: ErrorCode,
    /// The error message.
    pub message: String,
    /// Additional context.
    pub context: ErrorContext,
    /// The source error (if any).
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)
    }
}

impl QueryError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Add context about the operation.
    pub fn with_context(mut self, operation: impl Into<String>) -> Self {
        self.context.operation = Some(operation.into());
        self
    }

    /// Add a suggestion for fixing the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context.suggestions.push(Suggestion::new(suggestion));
        self
    }

    /// Add a code suggestion.
    pub fn with_code_suggestion(mut self, text: impl Into<String>, code: impl Into<String>) -> Self {
        self.context
            .suggestions
            .push(Suggestion::new(text).with_code(code));
        self
    }

    /// Add help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.context.help = Some(help.into());
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.context.model = Some(model.into());
        self
    }

    /// Set the field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.context.field = Some(field.into());
        self
    }

    /// Set the SQL statement.
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.context.sql = Some(sql.into());
        self
    }

    /// Set the source error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // ============== Constructor Functions ==============

    /// Create a not found error.
    pub fn not_found(model: impl Into<String>) -> Self {
        let model = model.into();
        Self::new(
            ErrorCode::RecordNotFound,
            format!("No {} record found matching the query", model),
        )
        .with_model(&model)
        .with_suggestion(format!("Verify the {} exists before querying", model))
        .with_code_suggestion(
            "Use first() instead to get None instead of an error",
            format!("client.query(\"{}\").filter(...).first()", model),
        )
    }

    /// Create a not unique error.
    pub fn not_unique(model: impl Into<String>) -> Self {
        let model = model.into();
        Self::new(
            ErrorCode::NotUnique,
            format!("Expected unique {} record but found multiple", model),
        )
        .with_model(&model)
        .with_suggestion("Add more specific filters to narrow down to a single record")
        .with_suggestion("Use fetch() if you expect multiple results")
    }

    /// Create an unknown field error.
    pub fn unknown_field(model: impl Into<String>, field: impl Into<String>) -> Self {
        let model = model.into();
        let field = field.into();
        Self::new(
            ErrorCode::InvalidFilter,
            format!("`{}` has no field or relation named `{}`", model, field),
        )
        .with_model(&model)
        .with_field(&field)
    }

    /// Create an invalid select/include error.
    pub fn invalid_select(
        model: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let model = model.into();
        let field = field.into();
        Self::new(
            ErrorCode::InvalidSelect,
            format!("Invalid selection `{}.{}`: {}", model, field, message.into()),
        )
        .with_model(&model)
        .with_field(&field)
    }

    /// Create an invalid input error.
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        let field = field.into();
        let message = message.into();
        Self::new(
            ErrorCode::InvalidParameter,
            format!("Invalid input for {}: {}", field, message),
        )
        .with_field(&field)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorCode::Internal, format!("Internal error: {}", message))
    }

    // ============== Guard Errors ==============

    /// A field excluded from the originating fetch was read.
    ///
    /// `selected` and `deferred` describe the restriction the record was
    /// fetched with and are echoed back in the message.
    pub fn missing_local_field(
        model: impl Into<String>,
        field: impl Into<String>,
        selected: &[&str],
        deferred: &[&str],
    ) -> Self {
        let model = model.into();
        let field = field.into();
        let selected = quote_list(selected);
        let deferred = quote_list(deferred);

        let (only_msg, defer_msg) = if deferred == format!("\"{}\"", field) {
            (
                "Remove the `only(...)`".to_string(),
                format!("remove the `defer({})`", deferred),
            )
        } else {
            (
                format!("Add `{}` to `only({})`", field, selected),
                format!("remove `{}` from `defer({})`", field, deferred),
            )
        };

        Self::new(
            ErrorCode::MissingLocalField,
            format!(
                "Access to `{model}.{field}` was prevented.\n\
                 {only_msg} or {defer_msg} where `{model}` objects are selected"
            ),
        )
        .with_model(&model)
        .with_field(&field)
        .with_context("field access")
    }

    /// A singular relation that was not eager-loaded was read.
    ///
    /// `column` is the local identifier column for forward relations.
    /// Only a forward foreign key may be prefetched; one-to-one relations
    /// are offered `select_related` alone.
    pub fn missing_relation_field(
        model: impl Into<String>,
        relation: impl Into<String>,
        remote_model: impl Into<String>,
        kind: RelationKind,
        column: Option<&str>,
    ) -> Self {
        let model = model.into();
        let relation = relation.into();
        let remote_model = remote_model.into();

        let mut message = format!("Access to `{model}.{relation}` was prevented.\n");
        if let Some(column) = column {
            message.push_str(&format!(
                "If you only need access to the column identifier, use `{model}.{column}` instead.\n"
            ));
        }
        let directive = if kind == RelationKind::ForwardManyToOne {
            format!("`prefetch_related(\"{relation}\")` or `select_related(\"{relation}\")`")
        } else {
            format!("`select_related(\"{relation}\")`")
        };
        message.push_str(&format!(
            "To fetch the `{remote_model}` object, add {directive} to the query where `{model}` objects are selected."
        ));

        Self::new(ErrorCode::MissingRelationField, message)
            .with_model(&model)
            .with_field(&relation)
            .with_context("relation access")
    }

    /// A collection relation that was not prefetched was read.
    ///
    /// `existing` lists the relations that were prefetched instead, if any.
    pub fn missing_reverse_relation_field(
        model: impl Into<String>,
        relation: impl Into<String>,
        remote_model: impl Into<String>,
        existing: &[&str],
    ) -> Self {
        let model = model.into();
        let relation = relation.into();
        let remote_model = remote_model.into();

        let hint = if existing.is_empty() {
            format!("add `prefetch_related(\"{relation}\")` to the query")
        } else {
            format!(
                "add \"{relation}\" to the existing `prefetch_related({})` part of the query",
                quote_list(existing)
            )
        };

        Self::new(
            ErrorCode::MissingReverseRelationField,
            format!(
                "Access to `{model}.{relation}.all()` was prevented.\n\
                 To fetch the `{remote_model}` objects, {hint} where `{model}` objects are selected."
            ),
        )
        .with_model(&model)
        .with_field(&relation)
        .with_context("relation access")
    }

    /// A refinement was called on a manager populated by prefetch.
    ///
    /// `call` is the rendered call (e.g. `filter(...)`), `alternatives` are
    /// `(label, code)` pairs appended to the message.
    pub fn blocked_method(
        model: impl Into<String>,
        relation: impl Into<String>,
        call: &str,
        alternatives: &[(String, String)],
    ) -> Self {
        let model = model.into();
        let relation = relation.into();

        let mut message = format!(
            "Access to `{relation}.{call}` via `{model}` instance was prevented because of \
             previous `prefetch_related(\"{relation}\")`"
        );
        let mut err_suggestions = Vec::with_capacity(alternatives.len());
        for (label, code) in alternatives {
            message.push('\n');
            message.push_str(label);
            if !code.is_empty() {
                message.push_str(&format!("\n`{}`", code));
                err_suggestions.push(Suggestion::new(label.as_str()).with_code(code.as_str()));
            }
        }

        let mut err = Self::new(ErrorCode::BlockedMethod, message)
            .with_model(&model)
            .with_field(&relation)
            .with_context(format!("manager.{}", call));
        err.context.suggestions = err_suggestions;
        err
    }

    /// A relation was accessed on a record fetched without its identity field.
    pub fn ambiguous_identity(
        model: impl Into<String>,
        relation: impl Into<String>,
        pk: impl Into<String>,
    ) -> Self {
        let model = model.into();
        let relation = relation.into();
        let pk = pk.into();

        Self::new(
            ErrorCode::AmbiguousIdentity,
            format!(
                "Access to `{model}.{relation}` was prevented because `{model}.{pk}` was not loaded.\n\
                 Related objects cannot be resolved without the identity; \
                 remove `{pk}` from `defer(...)` where `{model}` objects are selected"
            ),
        )
        .with_model(&model)
        .with_field(&relation)
        .with_context("relation access")
        .with_help("The identity field is added to every `only(...)` automatically; only `defer(...)` can exclude it")
    }

    // ============== Error Checks ==============

    /// Check if this is a not found error.
    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::RecordNotFound
    }

    /// Check if this error was raised by a guard.
    pub fn is_guard_error(&self) -> bool {
        self.code.is_guard()
    }

    /// Check if this is a missing local field error.
    pub fn is_missing_field(&self) -> bool {
        self.code == ErrorCode::MissingLocalField
    }

    /// Check if this is a missing relation error, singular or collection.
    pub fn is_missing_relation(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::MissingRelationField | ErrorCode::MissingReverseRelationField
        )
    }

    /// Check if this is a missing collection relation error.
    pub fn is_missing_reverse_relation(&self) -> bool {
        self.code == ErrorCode::MissingReverseRelationField
    }

    /// Check if this is a blocked manager method error.
    pub fn is_blocked_method(&self) -> bool {
        self.code == ErrorCode::BlockedMethod
    }

    /// Check if this is an ambiguous identity error.
    pub fn is_ambiguous_identity(&self) -> bool {
        self.code == ErrorCode::AmbiguousIdentity
    }

    // ============== Display Functions ==============

    /// Get the error code.
    pub fn error_code(&self) -> &ErrorCode {
        &self.code
    }

    /// Get the documentation URL for this error.
    pub fn docs_url(&self) -> String {
        self.code.docs_url()
    }

    /// Display the full error with all context and suggestions.
    pub fn display_full(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Error [{}]: {}\n", self.code.code(), self.message));

        if let Some(ref op) = self.context.operation {
            output.push_str(&format!("  → While: {}\n", op));
        }
        if let Some(ref model) = self.context.model {
            output.push_str(&format!("  → Model: {}\n", model));
        }
        if let Some(ref field) = self.context.field {
            output.push_str(&format!("  → Field: {}\n", field));
        }

        // SQL (truncated if too long)
        if let Some(ref sql) = self.context.sql {
            let sql_display = if sql.chars().count() > 200 {
                format!("{}...", sql.chars().take(200).collect::<String>())
            } else {
                sql.clone()
            };
            output.push_str(&format!("  → SQL: {}\n", sql_display));
        }

        if !self.context.suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for (i, suggestion) in self.context.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion.text));
                if let Some(ref code) = suggestion.code {
                    output.push_str(&format!(
                        "     ```\n     {}\n     ```\n",
                        code.replace('\n', "\n     ")
                    ));
                }
            }
        }

        if let Some(ref help) = self.context.help {
            output.push_str(&format!("\nHelp: {}\n", help));
        }

        output.push_str(&format!("\nMore info: {}\n", self.docs_url()));

        output
    }
}

impl From<lazyguard_schema::SchemaError> for QueryError {
    fn from(err: lazyguard_schema::SchemaError) -> Self {
        Self::new(ErrorCode::InvalidConfiguration, err.to_string()).with_source(err)
    }
}

fn quote_list(items: &[&str]) -> String {
    items
        .iter()
        .map(|item| format!("\"{}\"", item))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode::RecordNotFound.code(), "P1001");
        assert_eq!(ErrorCode::MissingLocalField.code(), "P1101");
        assert_eq!(ErrorCode::AmbiguousIdentity.code(), "P1105");
    }

    #[test]
    fn test_guard_range() {
        assert!(ErrorCode::BlockedMethod.is_guard());
        assert!(!ErrorCode::InvalidSelect.is_guard());
        assert!(!ErrorCode::Internal.is_guard());
    }

    #[test]
    fn test_not_found_error() {
        let err = QueryError::not_found("User");
        assert!(err.is_not_found());
        assert!(!err.is_guard_error());
        assert!(err.message.contains("User"));
        assert!(!err.context.suggestions.is_empty());
    }

    #[test]
    fn test_missing_local_field_message() {
        let err = QueryError::missing_local_field("User", "name", &["email", "id"], &["name", "role_id"]);
        insta::assert_snapshot!(err.message, @r###"
        Access to `User.name` was prevented.
        Add `name` to `only("email", "id")` or remove `name` from `defer("name", "role_id")` where `User` objects are selected
        "###);
        assert!(err.is_missing_field());
        assert_eq!(err.context.model.as_deref(), Some("User"));
        assert_eq!(err.context.field.as_deref(), Some("name"));
    }

    #[test]
    fn test_missing_local_field_single_deferral() {
        let err = QueryError::missing_local_field("User", "name", &["email", "id"], &["name"]);
        assert!(err.message.contains("Remove the `only(...)` or remove the `defer(\"name\")`"));
    }

    #[test]
    fn test_missing_relation_field_message() {
        let err = QueryError::missing_relation_field(
            "User",
            "role",
            "Role",
            RelationKind::ForwardManyToOne,
            Some("role_id"),
        );
        insta::assert_snapshot!(err.message, @r###"
        Access to `User.role` was prevented.
        If you only need access to the column identifier, use `User.role_id` instead.
        To fetch the `Role` object, add `prefetch_related("role")` or `select_related("role")` to the query where `User` objects are selected.
        "###);
        assert!(err.is_missing_relation());
        assert!(!err.is_missing_reverse_relation());
    }

    #[test]
    fn test_one_to_one_offers_select_related_only() {
        let forward = QueryError::missing_relation_field(
            "Profile",
            "user",
            "User",
            RelationKind::ForwardOneToOne,
            Some("user_id"),
        );
        assert!(forward.message.ends_with(
            "add `select_related(\"user\")` to the query where `Profile` objects are selected."
        ));
        assert!(!forward.message.contains("prefetch_related"));

        let reverse = QueryError::missing_relation_field(
            "User",
            "profile",
            "Profile",
            RelationKind::ReverseOneToOne,
            None,
        );
        assert!(!reverse.message.contains("prefetch_related"));
        assert!(!reverse.message.contains("column identifier"));
    }

    #[test]
    fn test_missing_reverse_relation_variants() {
        let none = QueryError::missing_reverse_relation_field("Role", "users", "User", &[]);
        assert!(none.message.contains("add `prefetch_related(\"users\")` to the query"));

        let some =
            QueryError::missing_reverse_relation_field("Role", "users", "User", &["admins", "owner"]);
        assert!(some.message.contains(
            "add \"users\" to the existing `prefetch_related(\"admins\", \"owner\")` part of the query"
        ));
        assert!(some.is_missing_relation());
        assert!(some.is_missing_reverse_relation());
    }

    #[test]
    fn test_blocked_method_message() {
        let err = QueryError::blocked_method(
            "Role",
            "users",
            "filter(...)",
            &[(
                "Filter existing objects in memory with:".to_string(),
                "role.manager(\"users\")?.all()?.into_iter().filter(|user| ...)".to_string(),
            )],
        );
        assert!(err.is_blocked_method());
        assert!(err.message.starts_with(
            "Access to `users.filter(...)` via `Role` instance was prevented because of previous `prefetch_related(\"users\")`"
        ));
        assert_eq!(err.context.suggestions.len(), 1);
        assert!(err.display_full().contains("Suggestions"));
    }

    #[test]
    fn test_ambiguous_identity() {
        let err = QueryError::ambiguous_identity("User", "role", "id");
        assert!(err.is_ambiguous_identity());
        assert!(err.is_guard_error());
        assert!(!err.is_missing_relation());
    }

    #[test]
    fn test_display_full() {
        let err = QueryError::missing_relation_field(
            "User",
            "role",
            "Role",
            RelationKind::ForwardManyToOne,
            None,
        )
        .with_sql("SELECT * FROM role WHERE id = 1");

        let output = err.display_full();
        assert!(output.contains("P1102"));
        assert!(output.contains("→ Model: User"));
        assert!(output.contains("→ Field: role"));
        assert!(output.contains("→ SQL:"));
        assert!(output.ends_with("More info: https://github.com/pegasusheavy/lazyguard#p1102\n"));
    }
}
