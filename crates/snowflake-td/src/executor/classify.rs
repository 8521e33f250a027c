//! Translation of raw warehouse errors into user-actionable categories.

use regex::Regex;

use crate::error::{ConfigErrorKind, Result, TdError, WarehouseError};

/// Noisy prefix Snowflake puts in front of failures inside a
/// multi-statement request. Everything up to the first newline is dropped.
pub const MULTI_STATEMENT_PREAMBLE: &str =
    "JavaScript execution error: Uncaught Execution of multiple statements failed on statement";

/// Built-in rules, evaluated top-down.
const SNOWFLAKE_RULES: &[(&str, ConfigErrorKind, &str)] = &[
    (
        r"(?i)is not allowed to access Snowflake",
        ConfigErrorKind::NetworkPolicy,
        "The network policy of the Snowflake account does not allow this client's IP address.",
    ),
    (
        r"(?i)Incorrect username or password was specified",
        ConfigErrorKind::Credentials,
        "Snowflake rejected the username or password.",
    ),
    (
        r"(?i)JWT token is invalid",
        ConfigErrorKind::Credentials,
        "Snowflake rejected the key-pair JWT. Check the private key and the registered public key.",
    ),
    (
        r"(?i)(invalid|expired) OAuth access token|OAuth access token (has )?expired",
        ConfigErrorKind::Credentials,
        "Snowflake rejected the OAuth access token. Refresh or reissue the token.",
    ),
    (
        concat!(
            r"(?i)programmatic access token (is )?(invalid|expired|has expired)",
            r"|(invalid|expired) programmatic access token",
        ),
        ConfigErrorKind::Credentials,
        "Snowflake rejected the programmatic access token. Reissue the token.",
    ),
    (
        r"^HTTP 401\b",
        ConfigErrorKind::Credentials,
        "Snowflake rejected the authorization token.",
    ),
    (
        r"(?i)insufficient privileges",
        ConfigErrorKind::Permissions,
        "The configured role lacks privileges on the target database or schema.",
    ),
    (
        r"(?i)(quota has been exceeded|resource monitor .* (has|have) (been )?(reached|exceeded))",
        ConfigErrorKind::Quota,
        "The warehouse credit quota or resource monitor limit has been reached.",
    ),
    (
        r"(?i)warehouse .* (is|was) suspended",
        ConfigErrorKind::Warehouse,
        "The configured warehouse is suspended. Resume it or enable auto-resume.",
    ),
    (
        r"(?i)No active warehouse selected|warehouse .* does not exist or not authorized",
        ConfigErrorKind::Warehouse,
        "The configured warehouse does not exist or the role cannot use it.",
    ),
];

/// Built-in rules keyed by vendor error code, consulted when no message
/// rule matches.
const SNOWFLAKE_CODE_RULES: &[(&str, ConfigErrorKind, &str)] = &[
    (
        "390303",
        ConfigErrorKind::Credentials,
        "Snowflake rejected the OAuth access token. Refresh or reissue the token.",
    ),
    (
        "390318",
        ConfigErrorKind::Credentials,
        "The OAuth access token has expired. Refresh or reissue the token.",
    ),
];

/// One classification rule.
#[derive(Debug, Clone)]
pub struct ClassificationRule {
    pattern: Regex,
    kind: ConfigErrorKind,
    message: String,
}

impl ClassificationRule {
    pub fn kind(&self) -> ConfigErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_match(&self, vendor_message: &str) -> bool {
        self.pattern.is_match(vendor_message)
    }
}

/// Ordered list of rules mapping vendor messages to [`ConfigErrorKind`].
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    rules: Vec<ClassificationRule>,
    code_rules: Vec<(String, ConfigErrorKind, String)>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::snowflake()
    }
}

impl ErrorClassifier {
    /// A classifier with no rules; everything falls through.
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            code_rules: Vec::new(),
        }
    }

    /// The built-in Snowflake rules.
    pub fn snowflake() -> Self {
        let rules = SNOWFLAKE_RULES
            .iter()
            .filter_map(|(pattern, kind, message)| {
                Regex::new(pattern).ok().map(|pattern| ClassificationRule {
                    pattern,
                    kind: *kind,
                    message: message.to_string(),
                })
            })
            .collect();
        let code_rules = SNOWFLAKE_CODE_RULES
            .iter()
            .map(|(code, kind, message)| (code.to_string(), *kind, message.to_string()))
            .collect();
        Self { rules, code_rules }
    }

    /// Append a rule; it is evaluated after every existing rule.
    pub fn with_rule(
        mut self,
        pattern: &str,
        kind: ConfigErrorKind,
        message: impl Into<String>,
    ) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| TdError::Config(format!("Invalid classification pattern: {}", e)))?;
        self.rules.push(ClassificationRule {
            pattern,
            kind,
            message: message.into(),
        });
        Ok(self)
    }

    /// Append a rule matching the vendor error code exactly. Code rules are
    /// consulted only when no message rule matches.
    pub fn with_code_rule(
        mut self,
        code: impl Into<String>,
        kind: ConfigErrorKind,
        message: impl Into<String>,
    ) -> Self {
        self.code_rules.push((code.into(), kind, message.into()));
        self
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    /// First rule matching `vendor_message`.
    pub fn find(&self, vendor_message: &str) -> Option<&ClassificationRule> {
        self.rules.iter().find(|rule| rule.is_match(vendor_message))
    }

    /// Classify a warehouse error. Errors no rule recognizes are handed to
    /// `fallback`.
    pub fn classify<F>(&self, err: WarehouseError, fallback: F) -> TdError
    where
        F: FnOnce(WarehouseError) -> TdError,
    {
        let by_message = self
            .find(&err.message)
            .map(|rule| (rule.kind, rule.message.clone()));
        let by_code = || {
            let code = err.code.as_deref()?;
            self.code_rules
                .iter()
                .find(|(c, _, _)| c == code)
                .map(|(_, kind, message)| (*kind, message.clone()))
        };
        match by_message.or_else(by_code) {
            Some((kind, message)) => TdError::Configuration {
                kind,
                message,
                vendor: err,
            },
            None => fallback(err),
        }
    }

    /// Classify the failure of a warehouse call. Errors that did not come
    /// from the warehouse itself (transport, decoding) are turned into a
    /// [`WarehouseError`] carrying their text, so they reach `fallback` too.
    /// Cancellation is returned unchanged.
    pub fn classify_any<F>(&self, err: TdError, fallback: F) -> TdError
    where
        F: FnOnce(WarehouseError) -> TdError,
    {
        let vendor = match err {
            TdError::Warehouse(vendor) => vendor,
            TdError::Cancelled => return TdError::Cancelled,
            other => WarehouseError::new(other.to_string()),
        };
        self.classify(vendor, fallback)
    }

    /// Classify any crate error. Only [`TdError::Warehouse`] is inspected;
    /// other errors are returned unchanged.
    pub fn classify_error<F>(&self, err: TdError, fallback: F) -> TdError
    where
        F: FnOnce(WarehouseError) -> TdError,
    {
        match err {
            TdError::Warehouse(vendor) => self.classify(vendor, fallback),
            other => other,
        }
    }
}

/// Drop the multi-statement preamble, up to and including the first
/// newline. Messages without it are returned trimmed.
pub fn strip_preamble(message: &str) -> &str {
    let trimmed = message.trim_start();
    if !trimmed.starts_with(MULTI_STATEMENT_PREAMBLE) {
        return message.trim();
    }
    match trimmed.find('\n') {
        Some(newline) => trimmed[newline + 1..].trim(),
        None => trimmed[MULTI_STATEMENT_PREAMBLE.len()..].trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(classifier: &ErrorClassifier, message: &str) -> Option<ConfigErrorKind> {
        match classifier.classify(WarehouseError::new(message), TdError::Warehouse) {
            TdError::Configuration { kind, .. } => Some(kind),
            _ => None,
        }
    }

    #[test]
    fn test_builtin_rules_compile() {
        assert_eq!(ErrorClassifier::snowflake().rules().len(), SNOWFLAKE_RULES.len());
    }

    #[test]
    fn test_builtin_classification() {
        let c = ErrorClassifier::default();
        assert_eq!(
            kind_of(&c, "IP address 10.0.0.1 is not allowed to access Snowflake. Contact your local security administrator."),
            Some(ConfigErrorKind::NetworkPolicy)
        );
        assert_eq!(
            kind_of(&c, "Incorrect username or password was specified."),
            Some(ConfigErrorKind::Credentials)
        );
        assert_eq!(kind_of(&c, "JWT token is invalid."), Some(ConfigErrorKind::Credentials));
        assert_eq!(
            kind_of(&c, "SQL access control error:\nInsufficient privileges to operate on schema 'PUBLIC'"),
            Some(ConfigErrorKind::Permissions)
        );
        assert_eq!(
            kind_of(&c, "Your free trial has ended and all of your virtual warehouses have been suspended. Quota has been exceeded."),
            Some(ConfigErrorKind::Quota)
        );
        assert_eq!(
            kind_of(&c, "Warehouse 'COMPUTE_WH' cannot be resumed because resource monitor 'LIMIT' has exceeded its quota."),
            Some(ConfigErrorKind::Quota)
        );
        assert_eq!(
            kind_of(&c, "Warehouse 'COMPUTE_WH' is suspended"),
            Some(ConfigErrorKind::Warehouse)
        );
        assert_eq!(
            kind_of(&c, "No active warehouse selected in the current session."),
            Some(ConfigErrorKind::Warehouse)
        );
        assert_eq!(
            kind_of(&c, "Invalid OAuth access token. [1234]"),
            Some(ConfigErrorKind::Credentials)
        );
        assert_eq!(
            kind_of(&c, "OAuth access token expired. [1234]"),
            Some(ConfigErrorKind::Credentials)
        );
        assert_eq!(
            kind_of(&c, "Programmatic access token is invalid."),
            Some(ConfigErrorKind::Credentials)
        );
        assert_eq!(kind_of(&c, "HTTP 401: Unauthorized"), Some(ConfigErrorKind::Credentials));
        assert_eq!(kind_of(&c, "HTTP 4010 rows"), None);
        assert_eq!(kind_of(&c, "SQL compilation error: invalid identifier 'FOO'"), None);
    }

    #[test]
    fn test_classification_by_code() {
        let c = ErrorClassifier::default();
        for code in ["390303", "390318"] {
            let err = c.classify(
                WarehouseError::new("Authentication failed.").with_code(code),
                TdError::Warehouse,
            );
            assert!(err.is_configuration(), "code {} should be a credentials error", code);
        }

        let err = c.classify(
            WarehouseError::new("Authentication failed.").with_code("000001"),
            TdError::Warehouse,
        );
        assert!(!err.is_configuration());

        let custom = ErrorClassifier::empty().with_code_rule("42", ConfigErrorKind::Quota, "q");
        match custom.classify(WarehouseError::new("x").with_code("42"), TdError::Warehouse) {
            TdError::Configuration { kind, message, .. } => {
                assert_eq!(kind, ConfigErrorKind::Quota);
                assert_eq!(message, "q");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_classify_any_wraps_non_warehouse_errors() {
        let c = ErrorClassifier::default();
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "operation timed out");
        match c.classify_any(TdError::Io(io), TdError::Warehouse) {
            TdError::Warehouse(vendor) => {
                assert!(vendor.message.contains("operation timed out"));
                assert_eq!(vendor.code, None);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            c.classify_any(TdError::Cancelled, TdError::Warehouse),
            TdError::Cancelled
        ));
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let c = ErrorClassifier::empty()
            .with_rule("denied", ConfigErrorKind::Permissions, "first")
            .unwrap()
            .with_rule("access denied", ConfigErrorKind::Credentials, "second")
            .unwrap();

        match c.classify(WarehouseError::new("access denied"), TdError::Warehouse) {
            TdError::Configuration { kind, message, vendor } => {
                assert_eq!(kind, ConfigErrorKind::Permissions);
                assert_eq!(message, "first");
                assert_eq!(vendor.message, "access denied");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_invalid_custom_rule() {
        let err = ErrorClassifier::empty()
            .with_rule("(unclosed", ConfigErrorKind::Quota, "x")
            .unwrap_err();
        assert!(matches!(err, TdError::Config(_)));
    }

    #[test]
    fn test_classify_error_passes_through_other_errors() {
        let c = ErrorClassifier::default();
        let err = c.classify_error(TdError::Cancelled, TdError::Warehouse);
        assert!(matches!(err, TdError::Cancelled));
    }

    #[test]
    fn test_strip_preamble() {
        let raw = format!(
            "{} 2 at position 0 of \"CREATE TABLE ...\"\nSQL compilation error: invalid identifier 'FOO'",
            MULTI_STATEMENT_PREAMBLE
        );
        assert_eq!(strip_preamble(&raw), "SQL compilation error: invalid identifier 'FOO'");
        assert_eq!(strip_preamble("  plain error \n"), "plain error");
        assert_eq!(strip_preamble(MULTI_STATEMENT_PREAMBLE), "");
    }
}
