/*!
 * Tests for speech providers, retry policy and the registry
 */

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use bookcast::app_config::{SpeechProviderKind, SynthesisConfig};
use bookcast::errors::{ProviderError, SynthesisError};
use bookcast::providers::{MockSpeechProvider, ProviderRegistry, RetryPolicy, SpeechProvider};

use crate::common;

/// Test that the retry policy backs off exponentially from the configured base
#[test]
fn test_retryPolicy_fromConfig_shouldUseConfiguredBackoff() {
    let config = SynthesisConfig {
        retry_count: 4,
        retry_backoff_ms: 100,
        ..SynthesisConfig::default()
    };

    let policy = RetryPolicy::from_config(&config);

    assert_eq!(policy.max_attempts, 4);
    assert_eq!(policy.delay_for(1), Duration::from_millis(100));
    assert_eq!(policy.delay_for(3), Duration::from_millis(400));
}

/// Test that a rate limit is retried while an auth failure is not
#[tokio::test]
async fn test_retryPolicy_run_shouldOnlyRetryTransientErrors() {
    let policy = RetryPolicy::new(3, Duration::from_millis(1));

    let mut calls = 0;
    let result: Result<u32, SynthesisError> = policy
        .run("test", |attempt| {
            calls += 1;
            async move {
                if attempt < 2 {
                    Err(ProviderError::RateLimitExceeded("429".into()))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;
    assert_eq!(result.unwrap(), 2);
    assert_eq!(calls, 2);

    let result: Result<(), SynthesisError> = policy
        .run("test", |_| async { Err(ProviderError::AuthenticationError("401".into())) })
        .await;
    assert!(matches!(result, Err(SynthesisError::Rejected(_))));
}

/// Test the mock's transient failure budget through the retry policy
#[tokio::test]
async fn test_mockProvider_withFlakyMarker_shouldRecoverWithinBudget() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let provider = MockSpeechProvider::new().flaky_on("wobbly", 1);

    let output = provider
        .synthesize("wobbly line", "yunxi", &temp_dir.path().join("p.wav"))
        .await?;

    assert!(output.bytes_written > 0);
    assert_eq!(provider.request_count(), 2);
    Ok(())
}

/// Test that a registry built from a mock config resolves the default backend
#[test]
fn test_registry_fromMockConfig_shouldResolveDefault() -> Result<()> {
    let config = SynthesisConfig {
        provider: SpeechProviderKind::Mock,
        ..SynthesisConfig::default()
    };

    let registry = ProviderRegistry::from_config(&config)?;

    assert_eq!(registry.get(None)?.name(), "mock");
    assert!(registry.get(Some("edge")).is_err());
    Ok(())
}

/// Test that hand-registered backends are reachable by name
#[test]
fn test_registry_register_shouldAddBackend() -> Result<()> {
    let mut registry = ProviderRegistry::new("mock");
    registry.register(Arc::new(MockSpeechProvider::new()));

    assert_eq!(registry.names(), vec!["mock".to_string()]);
    let provider = registry.get(Some("mock"))?;
    assert_eq!(provider.resolve_voice("XiaoXiao"), "zh-CN-XiaoxiaoNeural");
    assert_eq!(provider.resolve_voice("custom-voice"), "custom-voice");
    Ok(())
}
