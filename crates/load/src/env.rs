//! Credential materialisation helpers
//!
//! `${VAR}` tokens in sink credentials resolve from the process
//! environment at request time, so rotated secrets take effect without a
//! reload. Unknown variables keep the literal token.

use base64::Engine;
use etl_config::BasicAuthConfig;

/// Substitute `${VAR}` tokens with environment values
pub fn substitute_env_vars(input: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();
    re.replace_all(input, |caps: &regex::Captures<'_>| {
        match std::env::var(&caps[1]) {
            Ok(value) if !value.is_empty() => value,
            _ => caps[0].to_string(),
        }
    })
    .into_owned()
}

/// Build an `Authorization: Basic ...` header value
pub fn basic_auth_header(auth: &BasicAuthConfig) -> String {
    let username = substitute_env_vars(&auth.username);
    let password = substitute_env_vars(&auth.password);
    let encoded =
        base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
    format!("Basic {encoded}")
}
