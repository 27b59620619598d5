// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// File and asset validation against the injected rules.
//
// `validate_file` is a pure function of (size, declared type, file name,
// rules): identical inputs always yield identical results. Some mobile
// capture formats arrive without a declared MIME type, so an empty or
// unrecognized MIME falls back to case-insensitive extension matching.

use serde::{Deserialize, Serialize};
use tracing::debug;

use lichtbild_core::config::ValidationRules;
use lichtbild_core::types::{Dimensions, ImageSource};

/// Machine-readable validation failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueCode {
    /// File exceeds `max_size_bytes`.
    FileTooLarge,
    /// Neither the declared MIME type nor the file extension is accepted.
    UnsupportedType,
    /// Decoded image is smaller than `min_dimensions`.
    DimensionsTooSmall,
    /// Decoded image is larger than `max_dimensions`.
    DimensionsTooLarge,
    /// Warning: accepted via extension because the MIME type was empty or
    /// unrecognized.
    UnrecognizedMimeType,
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub code: IssueCode,
    pub message: String,
}

/// Outcome of a validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    fn from_findings(errors: Vec<ValidationIssue>, warnings: Vec<ValidationIssue>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// All error messages joined for a user-facing summary.
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|issue| issue.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Validate a file's metadata against the rules. Both the size and the type
/// check always run, so a file can report multiple distinguishable failures.
pub fn validate_file(source: &ImageSource, rules: &ValidationRules) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // Size: upper bound only; zero-byte files pass.
    let size = source.size_bytes();
    if size > rules.max_size_bytes {
        errors.push(ValidationIssue {
            code: IssueCode::FileTooLarge,
            message: format!(
                "file is {size} bytes; the limit is {} bytes",
                rules.max_size_bytes
            ),
        });
    }

    // Type: declared MIME first, extension as the fallback.
    let mime = source.declared_mime_type.trim();
    let mime_recognized = !mime.is_empty()
        && rules
            .allowed_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(mime));

    if !mime_recognized {
        let extension_recognized = source.extension().is_some_and(|ext| {
            rules
                .allowed_extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext))
        });

        if extension_recognized {
            warnings.push(ValidationIssue {
                code: IssueCode::UnrecognizedMimeType,
                message: if mime.is_empty() {
                    format!(
                        "no declared MIME type; accepted by the '{}' extension",
                        source.extension().unwrap_or_default()
                    )
                } else {
                    format!(
                        "declared MIME type '{mime}' is not recognized; accepted by the '{}' extension",
                        source.extension().unwrap_or_default()
                    )
                },
            });
        } else {
            errors.push(ValidationIssue {
                code: IssueCode::UnsupportedType,
                message: format!(
                    "type '{}' of '{}' is not supported",
                    if mime.is_empty() { "(none)" } else { mime },
                    source.file_name
                ),
            });
        }
    }

    debug!(
        file = %source.file_name,
        size,
        errors = errors.len(),
        warnings = warnings.len(),
        "file validated"
    );
    ValidationResult::from_findings(errors, warnings)
}

/// Validate decoded image dimensions. Only meaningful once the image has been
/// decoded, which is why it is a separate pass from `validate_file`.
pub fn validate_dimensions(dimensions: Dimensions, rules: &ValidationRules) -> ValidationResult {
    let mut errors = Vec::new();

    if let Some(min) = rules.min_dimensions {
        if dimensions.width < min.width || dimensions.height < min.height {
            errors.push(ValidationIssue {
                code: IssueCode::DimensionsTooSmall,
                message: format!("image is {dimensions}; the minimum is {min}"),
            });
        }
    }
    if let Some(max) = rules.max_dimensions {
        if dimensions.width > max.width || dimensions.height > max.height {
            errors.push(ValidationIssue {
                code: IssueCode::DimensionsTooLarge,
                message: format!("image is {dimensions}; the maximum is {max}"),
            });
        }
    }

    ValidationResult::from_findings(errors, Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(size: usize, mime: &str, name: &str) -> ImageSource {
        ImageSource {
            bytes: vec![0u8; size],
            declared_mime_type: mime.into(),
            file_name: name.into(),
        }
    }

    fn rules() -> ValidationRules {
        ValidationRules {
            max_size_bytes: 1000,
            ..ValidationRules::default()
        }
    }

    #[test]
    fn file_at_exact_limit_is_valid() {
        let verdict = validate_file(&source(1000, "image/jpeg", "photo.jpg"), &rules());
        assert!(verdict.valid);
        assert!(verdict.errors.is_empty());
    }

    #[test]
    fn file_one_byte_over_limit_is_invalid() {
        let verdict = validate_file(&source(1001, "image/jpeg", "photo.jpg"), &rules());
        assert!(!verdict.valid);
        assert_eq!(verdict.errors[0].code, IssueCode::FileTooLarge);
        // The message must name the configured limit.
        assert!(verdict.errors[0].message.contains("1000"));
    }

    #[test]
    fn zero_byte_file_is_valid() {
        let verdict = validate_file(&source(0, "image/png", "empty.png"), &rules());
        assert!(verdict.valid);
    }

    #[test]
    fn empty_mime_with_allowed_extension_is_valid() {
        let verdict = validate_file(&source(10, "", "Photo.HeIc"), &rules());
        assert!(verdict.valid, "{:?}", verdict.errors);
        assert_eq!(verdict.warnings[0].code, IssueCode::UnrecognizedMimeType);
    }

    #[test]
    fn empty_mime_with_unknown_extension_is_invalid() {
        let verdict = validate_file(&source(10, "", "document.pdf"), &rules());
        assert!(!verdict.valid);
        assert_eq!(verdict.errors[0].code, IssueCode::UnsupportedType);
    }

    #[test]
    fn empty_mime_without_extension_is_invalid() {
        let verdict = validate_file(&source(10, "", "photo"), &rules());
        assert!(!verdict.valid);
        assert_eq!(verdict.errors[0].code, IssueCode::UnsupportedType);
    }

    #[test]
    fn unrecognized_mime_falls_back_to_extension() {
        let verdict = validate_file(&source(10, "application/octet-stream", "scan.JPEG"), &rules());
        assert!(verdict.valid);
        assert_eq!(verdict.warnings[0].code, IssueCode::UnrecognizedMimeType);
    }

    #[test]
    fn oversize_and_wrong_type_report_distinct_codes() {
        let verdict = validate_file(&source(5000, "text/plain", "notes.txt"), &rules());
        assert!(!verdict.valid);
        let codes: Vec<IssueCode> = verdict.errors.iter().map(|issue| issue.code).collect();
        assert!(codes.contains(&IssueCode::FileTooLarge));
        assert!(codes.contains(&IssueCode::UnsupportedType));
    }

    #[test]
    fn validation_is_pure() {
        let input = source(123, "image/webp", "pic.webp");
        let r = rules();
        assert_eq!(validate_file(&input, &r), validate_file(&input, &r));
    }

    #[test]
    fn dimensions_inside_the_window_pass() {
        let verdict = validate_dimensions(Dimensions::new(800, 600), &rules());
        assert!(verdict.valid);
    }

    #[test]
    fn dimensions_below_minimum_fail() {
        let verdict = validate_dimensions(Dimensions::new(10, 10), &rules());
        assert!(!verdict.valid);
        assert_eq!(verdict.errors[0].code, IssueCode::DimensionsTooSmall);
    }

    #[test]
    fn dimension_checks_are_skipped_when_not_configured() {
        let mut r = rules();
        r.min_dimensions = None;
        r.max_dimensions = None;
        let verdict = validate_dimensions(Dimensions::new(1, 1), &r);
        assert!(verdict.valid);
    }
}
