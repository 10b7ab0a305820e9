use std::fmt;

/// Machine-readable error codes surfaced by the CLI and in structured logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    StoreUnreachable,
    StoreRejected,
    DocumentNotFound,
    InvalidDocument,
    MissingBusinessKey,
    SaveFailed,
    OrphanDocument,
    AuditAppendFailed,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::StoreUnreachable => "E2001",
            Self::StoreRejected => "E2002",
            Self::DocumentNotFound => "E2003",
            Self::InvalidDocument => "E2004",
            Self::MissingBusinessKey => "E3001",
            Self::SaveFailed => "E4001",
            Self::OrphanDocument => "E4002",
            Self::AuditAppendFailed => "E4003",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::StoreUnreachable => "Report store unreachable",
            Self::StoreRejected => "Report store rejected the request",
            Self::DocumentNotFound => "Document not found",
            Self::InvalidDocument => "Malformed document from store",
            Self::MissingBusinessKey => "Missing or unparseable report key",
            Self::SaveFailed => "Save failed",
            Self::OrphanDocument => "Superseded document left behind",
            Self::AuditAppendFailed => "Change log append failed",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in .docket/config.toml and retry."),
            Self::StoreUnreachable => {
                Some("Check the store URL and network, then retry. Your draft is kept.")
            }
            Self::StoreRejected => Some("Check the token and collection name in the config."),
            Self::DocumentNotFound | Self::InvalidDocument => None,
            Self::MissingBusinessKey => Some("Use a report date in YYYY-MM-DD form."),
            Self::SaveFailed => Some("Retry the save. Your draft is kept."),
            Self::OrphanDocument => {
                Some("Harmless: the newer record wins on read. Delete the old id manually to tidy up.")
            }
            Self::AuditAppendFailed => {
                Some("The report was saved; only its change history is incomplete.")
            }
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorCode;
    use std::collections::HashSet;

    const ALL: [ErrorCode; 10] = [
        ErrorCode::ConfigParseError,
        ErrorCode::StoreUnreachable,
        ErrorCode::StoreRejected,
        ErrorCode::DocumentNotFound,
        ErrorCode::InvalidDocument,
        ErrorCode::MissingBusinessKey,
        ErrorCode::SaveFailed,
        ErrorCode::OrphanDocument,
        ErrorCode::AuditAppendFailed,
        ErrorCode::InternalUnexpected,
    ];

    #[test]
    fn all_codes_are_unique() {
        let mut seen = HashSet::new();
        for code in ALL {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        for code in ALL {
            let raw = code.code();
            assert_eq!(raw.len(), 5);
            assert!(raw.starts_with('E'));
            assert!(raw.chars().skip(1).all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn display_matches_code() {
        assert_eq!(ErrorCode::SaveFailed.to_string(), "E4001");
    }
}
