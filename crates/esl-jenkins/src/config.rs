//! Jenkins connection settings.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JenkinsConfig {
    /// Server base URL, e.g. `https://jenkins.example.com/`.
    #[serde(alias = "jenkins_url")]
    pub url: String,
    #[serde(alias = "jenkins_user")]
    pub user: String,
    #[serde(alias = "jenkins_password")]
    pub password: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl JenkinsConfig {
    pub fn new(url: impl Into<String>, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user: user.into(),
            password: password.into(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_toml_with_aliases() {
        let config: JenkinsConfig = toml::from_str(
            r#"
jenkins_url = "https://ci.example.com/"
jenkins_user = "bot"
jenkins_password = "secret"
"#,
        )
        .unwrap();
        assert_eq!(config.url, "https://ci.example.com/");
        assert_eq!(config.user, "bot");
        assert_eq!(config.timeout_secs, 30);
    }
}
