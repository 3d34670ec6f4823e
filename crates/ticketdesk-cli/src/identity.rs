//! User identity resolution for audit entries.
//!
//! The resolution chain: `--user` flag > `TICKETDESK_USER` env > `user` in
//! config.toml > `USER` env (TTY only). Mutating commands require an identity;
//! read-only commands only use it to count "mine" badges.

use std::env;
use ticketdesk_core::error::ErrorCode;

use crate::output::CliError;

/// Environment reader trait for dependency injection in tests.
trait EnvReader {
    fn get(&self, key: &str) -> Option<String>;
    fn is_tty(&self) -> bool;
}

struct RealEnv;

impl EnvReader for RealEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.trim().is_empty())
    }

    fn is_tty(&self) -> bool {
        use std::io::IsTerminal;
        std::io::stdin().is_terminal()
    }
}

fn resolve_user_with(
    cli_flag: Option<&str>,
    config_user: Option<&str>,
    env: &dyn EnvReader,
) -> Option<String> {
    if let Some(user) = cli_flag.map(str::trim).filter(|u| !u.is_empty()) {
        return Some(user.to_string());
    }

    if let Some(val) = env.get("TICKETDESK_USER") {
        return Some(val);
    }

    if let Some(user) = config_user.map(str::trim).filter(|u| !u.is_empty()) {
        return Some(user.to_string());
    }

    // USER only when interactive.
    if env.is_tty() {
        if let Some(val) = env.get("USER") {
            return Some(val);
        }
    }

    None
}

/// Resolve the display name recorded in audit entries, if any.
pub fn resolve_user(cli_flag: Option<&str>, config_user: Option<&str>) -> Option<String> {
    resolve_user_with(cli_flag, config_user, &RealEnv)
}

/// Resolve the user, failing when none is available.
///
/// # Errors
///
/// Returns a [`CliError`] with a setup suggestion.
pub fn require_user(cli_flag: Option<&str>, config_user: Option<&str>) -> Result<String, CliError> {
    resolve_user(cli_flag, config_user).ok_or_else(|| CliError {
        message: "A user name is required to record who made this change.".to_string(),
        suggestion: Some(
            "Pass --user, set TICKETDESK_USER, or add `user = \"...\"` to config.toml".to_string(),
        ),
        error_code: Some(ErrorCode::ValidationFailed.code().to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MockEnv {
        vars: HashMap<String, String>,
        tty: bool,
    }

    impl MockEnv {
        fn new() -> Self {
            Self {
                vars: HashMap::new(),
                tty: false,
            }
        }

        fn var(mut self, key: &str, val: &str) -> Self {
            self.vars.insert(key.to_string(), val.to_string());
            self
        }

        const fn tty(mut self) -> Self {
            self.tty = true;
            self
        }
    }

    impl EnvReader for MockEnv {
        fn get(&self, key: &str) -> Option<String> {
            self.vars.get(key).filter(|v| !v.trim().is_empty()).cloned()
        }

        fn is_tty(&self) -> bool {
            self.tty
        }
    }

    #[test]
    fn flag_takes_priority() {
        let env = MockEnv::new().var("TICKETDESK_USER", "env-user").tty();
        assert_eq!(
            resolve_user_with(Some("flag-user"), Some("cfg"), &env).as_deref(),
            Some("flag-user")
        );
    }

    #[test]
    fn env_beats_config() {
        let env = MockEnv::new().var("TICKETDESK_USER", "env-user");
        assert_eq!(
            resolve_user_with(None, Some("cfg"), &env).as_deref(),
            Some("env-user")
        );
    }

    #[test]
    fn config_beats_login_name() {
        let env = MockEnv::new().var("USER", "login").tty();
        assert_eq!(
            resolve_user_with(None, Some("Sam Rivera"), &env).as_deref(),
            Some("Sam Rivera")
        );
    }

    #[test]
    fn blank_values_are_skipped() {
        let env = MockEnv::new().var("TICKETDESK_USER", "  ");
        assert_eq!(
            resolve_user_with(Some(""), Some(" "), &env),
            None
        );
    }

    #[test]
    fn login_name_only_in_tty() {
        let env = MockEnv::new().var("USER", "bob");
        assert_eq!(resolve_user_with(None, None, &env), None);

        let env = MockEnv::new().var("USER", "bob").tty();
        assert_eq!(resolve_user_with(None, None, &env).as_deref(), Some("bob"));
    }

    #[test]
    fn require_user_succeeds_with_flag() {
        assert_eq!(require_user(Some("sam"), None).unwrap(), "sam");
    }
}
