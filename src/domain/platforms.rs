//! Platform targets and the target resolver
//!
//! A target is one `{provider, options?}` destination for a post. `classify`
//! checks each requested target against the caller's connection snapshot and
//! a declarative per-provider required-option table, and splits the list into
//! ready targets and per-provider issues. Readiness is a classification
//! outcome, never an error.

use serde::{Deserialize, Serialize};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef};
use sqlx::{Decode, Encode, Postgres, Type};

use super::connections::ConnectionSnapshot;

/// Supported publishing providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Instagram,
    Facebook,
    Pinterest,
    Tiktok,
    Twitter,
    Linkedin,
    Youtube,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Instagram => "instagram",
            Provider::Facebook => "facebook",
            Provider::Pinterest => "pinterest",
            Provider::Tiktok => "tiktok",
            Provider::Twitter => "twitter",
            Provider::Linkedin => "linkedin",
            Provider::Youtube => "youtube",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "instagram" => Some(Provider::Instagram),
            "facebook" => Some(Provider::Facebook),
            "pinterest" => Some(Provider::Pinterest),
            "tiktok" => Some(Provider::Tiktok),
            "twitter" => Some(Provider::Twitter),
            "linkedin" => Some(Provider::Linkedin),
            "youtube" => Some(Provider::Youtube),
            _ => None,
        }
    }

    /// Option keys a target must carry before it can be scheduled.
    ///
    /// Kept as a single table rather than per-provider branches so the
    /// resolver stays one code path.
    pub fn required_option_keys(&self) -> &'static [&'static str] {
        match self {
            Provider::Pinterest => &["board_id"],
            Provider::Youtube => &["title"],
            _ => &[],
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// sqlx Type/Decode/Encode so Provider can appear directly in FromRow structs
impl Type<Postgres> for Provider {
    fn type_info() -> PgTypeInfo {
        <String as Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <String as Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for Provider {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let s = <String as Decode<Postgres>>::decode(value)?;
        Provider::parse(&s).ok_or_else(|| format!("unknown provider: {}", s).into())
    }
}

impl Encode<'_, Postgres> for Provider {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        <String as Encode<Postgres>>::encode_by_ref(&self.as_str().to_owned(), buf)
    }
}

/// One requested destination for a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformTarget {
    pub provider: Provider,
    /// Provider-specific fields, e.g. `{"board_id": "..."}` for Pinterest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Value>,
}

/// Why a target is not ready
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueReason {
    Unconnected,
    MissingOption,
    DeliveryFailed,
}

/// A per-provider readiness (or delivery) problem attached to a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformIssue {
    pub provider: Provider,
    pub reason: IssueReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Result of classifying a requested target list
#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub ready: Vec<PlatformTarget>,
    pub issues: Vec<PlatformIssue>,
}

impl Classification {
    pub fn all_ready(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Classify requested targets against the current connection snapshot.
///
/// Output order follows input order; `issues` holds only the failing subset.
/// Pure - safe to re-run at create, update and resolve time, since connection
/// state can change between calls.
pub fn classify(targets: &[PlatformTarget], connections: &ConnectionSnapshot) -> Classification {
    let mut result = Classification::default();

    for target in targets {
        if !connections.is_connected(target.provider) {
            result.issues.push(PlatformIssue {
                provider: target.provider,
                reason: IssueReason::Unconnected,
                detail: None,
            });
            continue;
        }

        match missing_option_key(target) {
            Some(key) => result.issues.push(PlatformIssue {
                provider: target.provider,
                reason: IssueReason::MissingOption,
                detail: Some(format!("missing required option: {}", key)),
            }),
            None => result.ready.push(target.clone()),
        }
    }

    result
}

/// First required option key the target is missing, if any
fn missing_option_key(target: &PlatformTarget) -> Option<&'static str> {
    target
        .provider
        .required_option_keys()
        .iter()
        .find(|key| !has_valid_option(target.options.as_ref(), key))
        .copied()
}

fn has_valid_option(options: Option<&serde_json::Value>, key: &str) -> bool {
    match options.and_then(|o| o.get(key)) {
        Some(serde_json::Value::String(s)) => !s.trim().is_empty(),
        Some(serde_json::Value::Null) | None => false,
        Some(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(providers: &[Provider]) -> ConnectionSnapshot {
        ConnectionSnapshot::from_providers(providers.iter().copied())
    }

    fn target(provider: Provider) -> PlatformTarget {
        PlatformTarget {
            provider,
            options: None,
        }
    }

    #[test]
    fn test_all_connected_targets_are_ready() {
        let targets = vec![target(Provider::Instagram), target(Provider::Twitter)];
        let result = classify(&targets, &snapshot(&[Provider::Instagram, Provider::Twitter]));

        assert!(result.all_ready());
        assert_eq!(result.ready, targets);
    }

    #[test]
    fn test_unconnected_provider_gets_issue() {
        let targets = vec![target(Provider::Instagram), target(Provider::Facebook)];
        let result = classify(&targets, &snapshot(&[Provider::Instagram]));

        assert_eq!(result.ready, vec![target(Provider::Instagram)]);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].provider, Provider::Facebook);
        assert_eq!(result.issues[0].reason, IssueReason::Unconnected);
    }

    #[test]
    fn test_pinterest_requires_board_id() {
        let targets = vec![target(Provider::Pinterest)];
        let result = classify(&targets, &snapshot(&[Provider::Pinterest]));

        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].reason, IssueReason::MissingOption);
        assert_eq!(
            result.issues[0].detail.as_deref(),
            Some("missing required option: board_id")
        );
    }

    #[test]
    fn test_pinterest_with_board_id_is_ready() {
        let targets = vec![PlatformTarget {
            provider: Provider::Pinterest,
            options: Some(json!({"board_id": "recipes"})),
        }];
        let result = classify(&targets, &snapshot(&[Provider::Pinterest]));

        assert!(result.all_ready());
    }

    #[test]
    fn test_youtube_requires_title() {
        let targets = vec![target(Provider::Youtube)];
        let result = classify(&targets, &snapshot(&[Provider::Youtube]));

        assert_eq!(result.issues[0].reason, IssueReason::MissingOption);
        assert_eq!(
            result.issues[0].detail.as_deref(),
            Some("missing required option: title")
        );
    }

    #[test]
    fn test_blank_required_option_counts_as_missing() {
        let targets = vec![PlatformTarget {
            provider: Provider::Pinterest,
            options: Some(json!({"board_id": "  "})),
        }];
        let result = classify(&targets, &snapshot(&[Provider::Pinterest]));

        assert_eq!(result.issues[0].reason, IssueReason::MissingOption);
    }

    #[test]
    fn test_output_order_follows_input_order() {
        let targets = vec![
            target(Provider::Youtube),
            target(Provider::Linkedin),
            target(Provider::Tiktok),
        ];
        let result = classify(
            &targets,
            &snapshot(&[Provider::Linkedin, Provider::Tiktok]),
        );

        assert_eq!(
            result.ready,
            vec![target(Provider::Linkedin), target(Provider::Tiktok)]
        );
        assert_eq!(result.issues[0].provider, Provider::Youtube);
    }

    #[test]
    fn test_empty_targets_classify_clean() {
        let result = classify(&[], &snapshot(&[]));
        assert!(result.ready.is_empty());
        assert!(result.issues.is_empty());
    }
}
