use std::io::Write;

use tempfile::NamedTempFile;

use super::*;
use crate::query::QueryConfig;

fn parse(args: &[&str]) -> CliArgs {
    CliArgs::try_parse_from(args).expect("valid arguments")
}

#[test]
fn defaults_are_valid() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.api.base_url.as_str(), DEFAULT_API_URL);
    assert_eq!(settings.api.timeout, Duration::from_secs(30));
    assert!(settings.api.token.is_none());
    assert_eq!(settings.logging.level, LevelFilter::WARN);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert_eq!(settings.query.stale_time, Duration::from_secs(300));
    assert_eq!(settings.query.retry, 0);
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.api.base_url = Some("http://file.example".to_string());
    raw.logging.level = Some("info".to_string());

    let overrides = GlobalOverrides {
        api_url: Some("https://cli.example/api-root".to_string()),
        log_level: Some("debug".to_string()),
        query_retry: Some(2),
        ..Default::default()
    };

    raw.apply_overrides(&overrides).expect("overrides apply");
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.api.base_url.host_str(), Some("cli.example"));
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.query.retry, 2);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = GlobalOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_overrides(&overrides).expect("overrides apply");
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn token_file_wins_over_env_token() {
    let mut file = NamedTempFile::new().expect("tmp file");
    writeln!(file, "file-token").expect("write token");

    let mut raw = RawSettings::default();
    let overrides = GlobalOverrides {
        token_file: Some(file.path().to_path_buf()),
        token_env: Some("env-token".to_string()),
        ..Default::default()
    };

    raw.apply_overrides(&overrides).expect("overrides apply");
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.api.token.as_deref(), Some("file-token"));
}

#[test]
fn missing_token_file_is_rejected() {
    let mut raw = RawSettings::default();
    let overrides = GlobalOverrides {
        token_file: Some("/definitely/not/here/token".into()),
        ..Default::default()
    };

    let err = raw.apply_overrides(&overrides).expect_err("missing file");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "api.token_file",
            ..
        }
    ));
}

#[test]
fn invalid_values_are_rejected() {
    let mut raw = RawSettings::default();
    raw.api.base_url = Some("ftp://example.com".to_string());
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "api.base_url",
            ..
        })
    ));

    let mut raw = RawSettings::default();
    raw.api.timeout_seconds = Some(0);
    assert!(Settings::from_raw(raw).is_err());

    let mut raw = RawSettings::default();
    raw.logging.level = Some("chatty".to_string());
    assert!(Settings::from_raw(raw).is_err());

    let mut raw = RawSettings::default();
    raw.query.retry = Some(MAX_RETRY + 1);
    assert!(Settings::from_raw(raw).is_err());

    let mut raw = RawSettings::default();
    raw.query.retry_base_delay_ms = Some(1_000);
    raw.query.retry_max_delay_ms = Some(10);
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "query.retry_max_delay_ms",
            ..
        })
    ));
}

#[test]
fn zero_stale_time_is_accepted() {
    let mut raw = RawSettings::default();
    raw.query.stale_time_seconds = Some(0);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.query.stale_time, Duration::ZERO);
    assert_eq!(QueryConfig::from(&settings.query).ttl(), Duration::ZERO);
}

#[test]
fn explicit_config_file_is_layered() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("tmp config");
    writeln!(
        file,
        "[api]\nbase_url = \"http://config.example\"\ntimeout_seconds = 5\n\n[query]\nstale_time_seconds = 60\nretry = 1"
    )
    .expect("write config");

    let path = file.path().to_string_lossy().into_owned();
    let cli = parse(&["syndicate", "--config-file", &path, "--log-level", "info", "dashboard"]);
    let settings = load(&cli).expect("settings load");

    assert_eq!(settings.api.base_url.host_str(), Some("config.example"));
    assert_eq!(settings.api.timeout, Duration::from_secs(5));
    assert_eq!(settings.query.stale_time, Duration::from_secs(60));
    assert_eq!(settings.query.retry, 1);
    assert_eq!(settings.logging.level, LevelFilter::INFO);
}

#[test]
fn parse_newsletter_create_arguments() {
    let cli = parse(&[
        "syndicate",
        "newsletters",
        "create",
        "--title",
        "Weekly digest",
        "--source",
        "reddit",
        "--source",
        "hackernews",
    ]);

    match cli.command {
        Command::Newsletters(NewslettersArgs {
            action:
                NewslettersCmd::Create {
                    title,
                    subject,
                    sources,
                    ..
                },
        }) => {
            assert_eq!(title, "Weekly digest");
            assert!(subject.is_none());
            assert_eq!(sources, vec!["reddit", "hackernews"]);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn create_requires_a_source() {
    let result = CliArgs::try_parse_from(["syndicate", "newsletters", "create", "--title", "x"]);
    assert!(result.is_err());
}

#[test]
fn global_flags_accepted_after_subcommand() {
    let cli = parse(&[
        "syndicate",
        "subscribers",
        "list",
        "--all",
        "--limit",
        "25",
        "--api-url",
        "http://localhost:9000",
    ]);

    assert_eq!(
        cli.overrides.api_url.as_deref(),
        Some("http://localhost:9000")
    );
    match cli.command {
        Command::Subscribers(SubscribersArgs {
            action: SubscribersCmd::List { page, all },
        }) => {
            assert!(all);
            assert_eq!(page.limit, Some(25));
            assert_eq!(page.page, None);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parse_update_status() {
    let cli = parse(&["syndicate", "newsletters", "update", "7", "--status", "scheduled"]);
    match cli.command {
        Command::Newsletters(NewslettersArgs {
            action: NewslettersCmd::Update { id, status, .. },
        }) => {
            assert_eq!(id, 7);
            assert_eq!(status, Some(NewsletterStatusArg::Scheduled));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parse_source_add_with_keywords() {
    let cli = parse(&[
        "syndicate",
        "sources",
        "add",
        "--platform",
        "hackernews",
        "--query",
        "rust",
        "--keyword",
        "tokio",
        "--keyword",
        "serde",
    ]);
    match cli.command {
        Command::Sources(SourcesArgs {
            action:
                SourcesCmd::Add {
                    platform, keywords, ..
                },
        }) => {
            assert_eq!(platform, "hackernews");
            assert_eq!(keywords, vec!["tokio", "serde"]);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parse_subscriber_update_and_profile() {
    let cli = parse(&[
        "syndicate",
        "subscribers",
        "update",
        "8",
        "--email",
        "grace@example.com",
    ]);
    match cli.command {
        Command::Subscribers(SubscribersArgs {
            action: SubscribersCmd::Update { id, email, name },
        }) => {
            assert_eq!(id, 8);
            assert_eq!(email, "grace@example.com");
            assert!(name.is_none());
        }
        other => panic!("unexpected command: {other:?}"),
    }

    assert!(matches!(
        parse(&["syndicate", "profile"]).command,
        Command::Profile
    ));
    assert!(CliArgs::try_parse_from(["syndicate", "sources", "update", "3", "--query", "x"]).is_err());
}
