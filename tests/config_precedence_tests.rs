mod common;

use common::config_test_utils::with_config_env;
use sharegate::common::config::{
    apply_overrides, config_path, load_config, ConfigOverrides, Transport,
};
use std::time::Duration;

#[test]
fn defaults_apply_without_file_values() {
    with_config_env("", || {
        let config = load_config().expect("load config");
        assert_eq!(config.transport, Transport::Cloudflare);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.share.timeout, 600);
        assert!(config.ngrok.authtoken.is_none());
    });
}

#[test]
fn config_file_lives_under_xdg_config_home() {
    with_config_env("", || {
        let path = config_path();
        assert!(path.ends_with("sharegate/config.toml"), "{}", path.display());
    });
}

#[test]
fn file_overrides_defaults() {
    with_config_env(
        r#"
        transport = "ngrok"

        [server]
        port = 1111

        [share]
        timeout = 30

        [ngrok]
        authtoken = "file-token"
        "#,
        || {
            let config = load_config().expect("load config");
            assert_eq!(config.transport, Transport::Ngrok);
            assert_eq!(config.server.port, 1111);
            assert_eq!(config.share.confirm_window(), Duration::from_secs(30));
            assert_eq!(config.ngrok.authtoken.as_deref(), Some("file-token"));
        },
    );
}

#[test]
fn env_overrides_file() {
    with_config_env(
        r#"
        transport = "ngrok"

        [server]
        port = 1111
        "#,
        || {
            std::env::set_var("SHAREGATE_SERVER_PORT", "2222");
            std::env::set_var("SHAREGATE_TRANSPORT", "local");
            std::env::set_var("SHAREGATE_SHARE_TIMEOUT", "45");

            let config = load_config().expect("load config");
            assert_eq!(config.server.port, 2222);
            assert_eq!(config.transport, Transport::Local);
            assert_eq!(config.share.timeout, 45);
        },
    );
}

#[test]
fn cli_overrides_env_and_file() {
    with_config_env(
        r#"
        [server]
        port = 1111
        "#,
        || {
            std::env::set_var("SHAREGATE_SERVER_PORT", "2222");

            let overrides = ConfigOverrides {
                transport: Some(Transport::Local),
                port: Some(3333),
                timeout: None,
            };

            let config = load_config().expect("load config");
            let config = apply_overrides(config, &overrides).expect("valid overrides");
            assert_eq!(config.server.port, 3333);
            assert_eq!(config.transport, Transport::Local);
            assert_eq!(config.share.timeout, 600);
        },
    );
}

#[test]
fn env_applies_without_cli() {
    with_config_env(
        r#"
        [server]
        port = 1111
        "#,
        || {
            std::env::set_var("SHAREGATE_SERVER_PORT", "2222");

            let config = load_config().expect("load config");
            let config =
                apply_overrides(config, &ConfigOverrides::default()).expect("no overrides");
            assert_eq!(config.server.port, 2222);
        },
    );
}
