//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The config file is optional when no path was given explicitly; a
//! Spotify client ID is public, so it may live in the file or come from
//! SPOTIFY_CLIENT_ID.

use serde::Deserialize;
use spotify_auth::AuthConfig;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use url::{Host, Url};

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Serve canned data instead of logging in (see `spotify_api::MockApi`)
    #[serde(default)]
    pub dev_mode: bool,
    #[serde(default)]
    pub spotify: SpotifyConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// Client registration
#[derive(Debug, Deserialize)]
pub struct SpotifyConfig {
    #[serde(default)]
    pub client_id: String,
    /// Must match a redirect URI registered for the client, byte for byte
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
}

/// Where the session survives between runs
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_session_file")]
    pub session_file: PathBuf,
}

/// Outbound HTTP and login timing
#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// How long `login` waits for the browser to come back
    #[serde(default = "default_login_timeout")]
    pub login_timeout_secs: u64,
}

fn default_redirect_uri() -> String {
    "http://127.0.0.1:8888/callback".into()
}

fn default_session_file() -> PathBuf {
    PathBuf::from("spotify-session.json")
}

fn default_timeout() -> u64 {
    30
}

fn default_login_timeout() -> u64 {
    600
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            redirect_uri: default_redirect_uri(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            session_file: default_session_file(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            login_timeout_secs: default_login_timeout(),
        }
    }
}

/// Accepts 1/true/yes/on, case-insensitive.
fn env_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.finish()
    }

    /// Like `load`, but a missing file means all defaults.
    pub fn load_or_default(path: &Path) -> common::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Config::default().finish()
        }
    }

    /// Overlay environment variables, then validate.
    fn finish(mut self) -> common::Result<Self> {
        if let Ok(client_id) = std::env::var("SPOTIFY_CLIENT_ID") {
            self.spotify.client_id = client_id;
        }
        if let Ok(redirect_uri) = std::env::var("SPOTIFY_REDIRECT_URI") {
            self.spotify.redirect_uri = redirect_uri;
        }
        if let Ok(path) = std::env::var("SPOTIFY_SESSION_FILE") {
            self.storage.session_file = PathBuf::from(path);
        }
        if let Ok(flag) = std::env::var("SPOTIFY_DEV_MODE") {
            self.dev_mode = env_flag(&flag);
        }
        self.spotify.client_id = self.spotify.client_id.trim().to_owned();

        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> common::Result<()> {
        if !self.dev_mode && self.spotify.client_id.is_empty() {
            return Err(common::Error::Config(
                "spotify.client_id is required (or set SPOTIFY_CLIENT_ID)".into(),
            ));
        }

        let redirect = Url::parse(&self.spotify.redirect_uri)?;
        match redirect.scheme() {
            "https" => {}
            "http" if is_loopback(&redirect) => {}
            "http" => {
                return Err(common::Error::Config(format!(
                    "redirect_uri over http must use a loopback address, got: {}",
                    self.spotify.redirect_uri
                )));
            }
            other => {
                return Err(common::Error::Config(format!(
                    "redirect_uri must be http:// or https://, got scheme: {other}"
                )));
            }
        }

        if self.http.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if self.http.login_timeout_secs == 0 {
            return Err(common::Error::Config(
                "login_timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig::new(&self.spotify.client_id, &self.spotify.redirect_uri)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    ///
    /// The flag is true when the path was chosen explicitly and must exist.
    pub fn resolve_path(cli_path: Option<&str>) -> (PathBuf, bool) {
        if let Some(p) = cli_path {
            return (PathBuf::from(p), true);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return (PathBuf::from(p), true);
        }
        (PathBuf::from("spotify-session.toml"), false)
    }
}

/// Whether the URL's host is a loopback literal or `localhost`.
pub fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Ipv4(ip)) => IpAddr::V4(ip).is_loopback(),
        Some(Host::Ipv6(ip)) => IpAddr::V6(ip).is_loopback(),
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize tests that mutate environment variables, preventing
    /// data races when tests run in parallel.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const ENV_VARS: &[&str] = &[
        "SPOTIFY_CLIENT_ID",
        "SPOTIFY_REDIRECT_URI",
        "SPOTIFY_SESSION_FILE",
        "SPOTIFY_DEV_MODE",
        "CONFIG_PATH",
    ];

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn clear_env() {
        for key in ENV_VARS {
            unsafe { std::env::remove_var(key) };
        }
    }

    fn valid_toml() -> &'static str {
        r#"
[spotify]
client_id = "0123456789abcdef"
redirect_uri = "http://127.0.0.1:8888/callback"

[storage]
session_file = "/var/lib/spotify/session.json"

[http]
timeout_secs = 10
"#
    }

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_valid_config() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, valid_toml());

        let config = Config::load(&path).unwrap();
        assert_eq!(config.spotify.client_id, "0123456789abcdef");
        assert_eq!(config.spotify.redirect_uri, "http://127.0.0.1:8888/callback");
        assert_eq!(
            config.storage.session_file,
            PathBuf::from("/var/lib/spotify/session.json")
        );
        assert_eq!(config.http.timeout_secs, 10);
        assert_eq!(config.http.login_timeout_secs, 600);
        assert!(!config.dev_mode);

        let auth = config.auth_config();
        assert_eq!(auth.client_id, "0123456789abcdef");
        assert_eq!(auth.token_endpoint, "https://accounts.spotify.com/api/token");
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_or_default_without_file_uses_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_env() };
        unsafe { set_env("SPOTIFY_CLIENT_ID", "  from-env  ") };

        let config = Config::load_or_default(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.spotify.client_id, "from-env");
        assert_eq!(config.spotify.redirect_uri, "http://127.0.0.1:8888/callback");
        assert_eq!(
            config.storage.session_file,
            PathBuf::from("spotify-session.json")
        );
        assert_eq!(config.http.timeout_secs, 30);

        unsafe { clear_env() };
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "not valid {{{{ toml");
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_missing_client_id_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[spotify]\nclient_id = \"   \"\n");

        let err = Config::load(&path).unwrap_err().to_string();
        assert!(err.contains("client_id is required"), "got: {err}");
    }

    #[test]
    fn test_dev_mode_does_not_need_client_id() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "dev_mode = true\n");

        let config = Config::load(&path).unwrap();
        assert!(config.dev_mode);
    }

    #[test]
    fn test_dev_mode_from_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_env() };
        unsafe { set_env("SPOTIFY_DEV_MODE", "TRUE") };

        let config = Config::load_or_default(Path::new("/nonexistent/config.toml")).unwrap();
        assert!(config.dev_mode);

        unsafe { set_env("SPOTIFY_DEV_MODE", "0") };
        unsafe { set_env("SPOTIFY_CLIENT_ID", "id") };
        let config = Config::load_or_default(Path::new("/nonexistent/config.toml")).unwrap();
        assert!(!config.dev_mode);

        unsafe { clear_env() };
    }

    #[test]
    fn test_env_overrides_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, valid_toml());

        unsafe { set_env("SPOTIFY_CLIENT_ID", "env-client") };
        unsafe { set_env("SPOTIFY_REDIRECT_URI", "http://localhost:9999/cb") };
        unsafe { set_env("SPOTIFY_SESSION_FILE", "/tmp/other.json") };
        let config = Config::load(&path).unwrap();
        assert_eq!(config.spotify.client_id, "env-client");
        assert_eq!(config.spotify.redirect_uri, "http://localhost:9999/cb");
        assert_eq!(config.storage.session_file, PathBuf::from("/tmp/other.json"));

        unsafe { clear_env() };
    }

    #[test]
    fn test_non_loopback_http_redirect_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[spotify]
client_id = "id"
redirect_uri = "http://example.com/callback"
"#,
        );

        let err = Config::load(&path).unwrap_err().to_string();
        assert!(err.contains("loopback"), "got: {err}");
    }

    #[test]
    fn test_https_redirect_accepted() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[spotify]
client_id = "id"
redirect_uri = "https://example.github.io/guess/callback.html"
"#,
        );
        assert!(Config::load(&path).is_ok());
    }

    #[test]
    fn test_unparseable_redirect_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[spotify]\nclient_id = \"id\"\nredirect_uri = \"callback\"\n");

        let result = Config::load(&path);
        assert!(matches!(result, Err(common::Error::Url(_))));
    }

    #[test]
    fn test_custom_scheme_redirect_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[spotify]\nclient_id = \"id\"\nredirect_uri = \"myapp://cb\"\n");

        let err = Config::load(&path).unwrap_err().to_string();
        assert!(err.contains("http:// or https://"), "got: {err}");
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_env() };
        let dir = tempfile::tempdir().unwrap();

        let path = write_config(&dir, "[spotify]\nclient_id = \"id\"\n[http]\ntimeout_secs = 0\n");
        assert!(Config::load(&path).is_err(), "timeout_secs = 0 must be rejected");

        let path = write_config(
            &dir,
            "[spotify]\nclient_id = \"id\"\n[http]\nlogin_timeout_secs = 0\n",
        );
        assert!(Config::load(&path).is_err(), "login_timeout_secs = 0 must be rejected");
    }

    #[test]
    fn test_resolve_path_precedence() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_env() };

        assert_eq!(
            Config::resolve_path(None),
            (PathBuf::from("spotify-session.toml"), false)
        );

        unsafe { set_env("CONFIG_PATH", "/env/path.toml") };
        assert_eq!(
            Config::resolve_path(None),
            (PathBuf::from("/env/path.toml"), true)
        );
        assert_eq!(
            Config::resolve_path(Some("/cli/wins.toml")),
            (PathBuf::from("/cli/wins.toml"), true),
            "CLI arg must take precedence over CONFIG_PATH env var"
        );

        unsafe { clear_env() };
    }

    #[test]
    fn test_is_loopback() {
        for ok in [
            "http://127.0.0.1:8888/cb",
            "http://localhost/cb",
            "http://[::1]:8888/cb",
        ] {
            assert!(is_loopback(&Url::parse(ok).unwrap()), "{ok}");
        }
        for bad in ["http://10.0.0.1/cb", "http://example.com/cb"] {
            assert!(!is_loopback(&Url::parse(bad).unwrap()), "{bad}");
        }
    }
}
