/*!
 * Tests for application configuration
 */

use anyhow::Result;
use bookcast::app_config::{Config, LogLevel, SpeechProviderKind};
use bookcast::audio::AudioFormat;

use crate::common;

/// Test that a freshly created config file round-trips through load_or_create
#[test]
fn test_loadOrCreate_withExistingFile_shouldKeepCustomValues() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(
        temp_dir.path(),
        "conf.json",
        r#"{
            "audio_dir": "/tmp/bookcast-audio",
            "synthesis": { "provider": "mock", "voice": "yunxi", "max_rounds": 5 },
            "export": { "format": "flac", "min_group_minutes": 30, "create_archive": false },
            "log_level": "debug"
        }"#,
    )?;

    let config = Config::load_or_create(&path)?;

    assert_eq!(config.synthesis.provider, SpeechProviderKind::Mock);
    assert_eq!(config.synthesis.voice, "yunxi");
    assert_eq!(config.synthesis.max_rounds, 5);
    assert_eq!(config.export.format, AudioFormat::Flac);
    assert_eq!(config.export.min_group_ms(), 30 * 60_000);
    assert!(!config.export.create_archive);
    assert_eq!(config.log_level, LogLevel::Debug);
    assert_eq!(config.log_level.to_level_filter(), log::LevelFilter::Debug);
    Ok(())
}

/// Test that malformed JSON is reported instead of silently replaced
#[test]
fn test_loadOrCreate_withInvalidJson_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(temp_dir.path(), "conf.json", "{ not json")?;

    assert!(Config::load_or_create(&path).is_err());
    Ok(())
}

/// Test that an OpenAI config with a key and a valid endpoint validates
#[test]
fn test_validate_withOpenAiKey_shouldPass() {
    let mut config = Config::default();
    for provider in config.synthesis.available_providers.iter_mut() {
        if provider.provider_type == "openai" {
            provider.api_key = "sk-test".to_string();
        }
    }

    assert!(config.validate().is_ok());
}

/// Test that a malformed endpoint is rejected
#[test]
fn test_validate_withBadEndpoint_shouldFail() {
    let mut config = Config::default();
    for provider in config.synthesis.available_providers.iter_mut() {
        if provider.provider_type == "openai" {
            provider.api_key = "sk-test".to_string();
            provider.endpoint = "not a url".to_string();
        }
    }

    assert!(config.validate().is_err());
}

/// Test that the mock test config used across the suite is valid
#[test]
fn test_validate_withMockConfig_shouldPass() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;

    assert!(common::mock_config(temp_dir.path()).validate().is_ok());
    Ok(())
}
