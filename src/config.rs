// Process configuration, read from the environment (after `.env` is loaded).

use crate::core::blocklist::BlocklistDefaults;
use crate::core::channels::validate_claim_id;
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/moderation.db?mode=rwc";
const DEFAULT_SPAM_LIST_PATH: &str = "config/spammers.json";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing {0} environment variable")]
    Missing(&'static str),

    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// How request signatures are checked.
#[derive(Debug, Clone, PartialEq)]
pub enum VerifierConfig {
    Remote(String),
    /// Development only: every signature is accepted.
    AllowAll,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_url: String,
    pub spam_list_path: String,
    pub verifier: VerifierConfig,
    pub blocklist_defaults: BlocklistDefaults,
    pub global_moderators: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let allow_unsigned = parse_or("ALLOW_UNSIGNED", var("ALLOW_UNSIGNED"), false)?;
        let verifier = match (var("SIGNATURE_VERIFIER_URL"), allow_unsigned) {
            (Some(url), _) => VerifierConfig::Remote(url),
            (None, true) => VerifierConfig::AllowAll,
            (None, false) => return Err(ConfigError::Missing("SIGNATURE_VERIFIER_URL")),
        };

        let fallback = BlocklistDefaults::default();
        let blocklist_defaults = BlocklistDefaults {
            strike_one: parse_or("DEFAULT_STRIKE_ONE", var("DEFAULT_STRIKE_ONE"), fallback.strike_one)?,
            strike_two: parse_or("DEFAULT_STRIKE_TWO", var("DEFAULT_STRIKE_TWO"), fallback.strike_two)?,
            strike_three: parse_or(
                "DEFAULT_STRIKE_THREE",
                var("DEFAULT_STRIKE_THREE"),
                fallback.strike_three,
            )?,
            invite_expiration: parse_or(
                "DEFAULT_INVITE_EXPIRATION_HOURS",
                var("DEFAULT_INVITE_EXPIRATION_HOURS"),
                fallback.invite_expiration,
            )?,
            curse_jar_amount: parse_or(
                "DEFAULT_CURSE_JAR_AMOUNT",
                var("DEFAULT_CURSE_JAR_AMOUNT"),
                fallback.curse_jar_amount,
            )?,
        };

        let global_moderators = var("GLOBAL_MODERATORS")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(|id| {
                        validate_claim_id("GLOBAL_MODERATORS", id)
                            .map(|_| id.to_string())
                            .map_err(|e| ConfigError::Invalid {
                                name: "GLOBAL_MODERATORS",
                                reason: e.to_string(),
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            database_url: var("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            spam_list_path: var("SPAM_LIST_PATH")
                .unwrap_or_else(|| DEFAULT_SPAM_LIST_PATH.to_string()),
            verifier,
            blocklist_defaults,
            global_moderators,
        })
    }
}

fn parse_or<T>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: format!("'{}': {}", raw, e),
        }),
        None => Ok(default),
    }
}
