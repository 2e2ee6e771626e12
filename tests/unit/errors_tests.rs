/*!
 * Tests for error classification and messages
 */

use bookcast::errors::{DecodeError, MergeError, ProviderError, SynthesisError};
use std::path::PathBuf;

/// Test which provider failures are worth retrying
#[test]
fn test_providerError_isTransient_shouldSeparateRetryableFailures() {
    assert!(ProviderError::ConnectionError("reset".into()).is_transient());
    assert!(ProviderError::RateLimitExceeded("slow down".into()).is_transient());
    assert!(ProviderError::ApiError { status_code: 503, message: "busy".into() }.is_transient());
    assert!(!ProviderError::ApiError { status_code: 400, message: "bad".into() }.is_transient());
    assert!(!ProviderError::AuthenticationError("no key".into()).is_transient());
}

/// Test that exhausted retries mention the attempt count and the last cause
#[test]
fn test_synthesisError_exhausted_shouldDescribeAttempts() {
    let error = SynthesisError::Exhausted {
        attempts: 3,
        last: ProviderError::ConnectionError("refused".into()),
    };

    let message = error.to_string();
    assert!(message.contains('3'));
    assert!(message.contains("refused"));
}

/// Test merge and decode error messages name the offending input
#[test]
fn test_mergeAndDecodeErrors_shouldNameTheInput() {
    let merge = MergeError::UnreadableAudio {
        path: PathBuf::from("p_7.mp3"),
        reason: "bad header".into(),
    };
    assert!(merge.to_string().contains("p_7.mp3"));
    assert!(MergeError::EmptyMerge.to_string().to_lowercase().contains("no"));

    let decode = DecodeError::UnsupportedFormat(".pdf".into());
    assert!(decode.to_string().contains(".pdf"));
}

/// Test that stage errors keep their message when lifted into AppError
#[test]
fn test_appError_fromStageErrors_shouldWrapMessage() {
    use bookcast::errors::AppError;

    let app: AppError = MergeError::EmptyMerge.into();
    assert!(matches!(app, AppError::Merge(_)));
    assert!(app.to_string().starts_with("Merge error:"));

    let app: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
    assert!(matches!(app, AppError::File(ref m) if m.contains("gone")));

    let app: AppError = anyhow::anyhow!("boom").into();
    assert_eq!(app.to_string(), "Unknown error: boom");
}
