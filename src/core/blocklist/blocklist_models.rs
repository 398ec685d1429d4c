// Shared blocklist domain models.
//
// These are pure domain types; the rpc layer converts them to wire shapes.

use crate::core::channels::Channel;
use crate::core::errors::ModerationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MAX_LIST_NAME_LEN: usize = 100;
const MAX_CATEGORY_LEN: usize = 50;
const MAX_DESCRIPTION_LEN: usize = 1_000;
pub const MAX_INVITE_MESSAGE_LEN: usize = 1_000;
/// Upper bound for every duration setting: ten years, in hours.
pub const MAX_DURATION_HOURS: u64 = 24 * 365 * 10;

/// Configuration of a shared blocklist.
///
/// Every field is optional. On the stored list `None` means "inherit the
/// system default"; on an update it means "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListSettings {
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    /// Can accepted members invite further members?
    pub member_invite_enabled: Option<bool>,
    /// Ban duration in hours for each strike level, intended non-decreasing.
    pub strike_one: Option<u64>,
    pub strike_two: Option<u64>,
    pub strike_three: Option<u64>,
    /// Hours until a sent invite expires.
    pub invite_expiration: Option<u64>,
    /// Tip amount that auto-approves an appeal.
    pub curse_jar_amount: Option<u64>,
}

impl ListSettings {
    /// Apply only the fields present in `patch`.
    pub fn apply(&mut self, patch: &ListSettings) {
        fn set<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                *target = value.clone();
            }
        }

        set(&mut self.name, &patch.name);
        set(&mut self.category, &patch.category);
        set(&mut self.description, &patch.description);
        set(&mut self.member_invite_enabled, &patch.member_invite_enabled);
        set(&mut self.strike_one, &patch.strike_one);
        set(&mut self.strike_two, &patch.strike_two);
        set(&mut self.strike_three, &patch.strike_three);
        set(&mut self.invite_expiration, &patch.invite_expiration);
        set(&mut self.curse_jar_amount, &patch.curse_jar_amount);
    }

    /// Structural checks run before anything is persisted.
    pub fn validate(&self) -> Result<(), ModerationError> {
        check_text("name", self.name.as_deref(), MAX_LIST_NAME_LEN)?;
        check_text("category", self.category.as_deref(), MAX_CATEGORY_LEN)?;
        if let Some(description) = &self.description {
            if description.chars().count() > MAX_DESCRIPTION_LEN {
                return Err(ModerationError::Validation(format!(
                    "description must be at most {} characters",
                    MAX_DESCRIPTION_LEN
                )));
            }
        }
        check_hours("strike_one", self.strike_one)?;
        check_hours("strike_two", self.strike_two)?;
        check_hours("strike_three", self.strike_three)?;
        check_hours("invite_expiration", self.invite_expiration)?;
        if self.curse_jar_amount.is_some_and(|amount| amount > i64::MAX as u64) {
            return Err(ModerationError::Validation(
                "curse_jar_amount is out of range".to_string(),
            ));
        }
        Ok(())
    }

    pub fn member_invites_allowed(&self) -> bool {
        self.member_invite_enabled.unwrap_or(false)
    }
}

fn check_text(field: &str, value: Option<&str>, max: usize) -> Result<(), ModerationError> {
    match value {
        Some(v) if v.trim().is_empty() => Err(ModerationError::Validation(format!(
            "{} cannot be blank",
            field
        ))),
        Some(v) if v.chars().count() > max => Err(ModerationError::Validation(format!(
            "{} must be at most {} characters",
            field, max
        ))),
        Some(v) if v.chars().any(|c| c.is_control()) => Err(ModerationError::Validation(format!(
            "{} contains control characters",
            field
        ))),
        _ => Ok(()),
    }
}

fn check_hours(field: &str, value: Option<u64>) -> Result<(), ModerationError> {
    match value {
        Some(hours) if hours > MAX_DURATION_HOURS => Err(ModerationError::Validation(format!(
            "{} must be at most {} hours",
            field, MAX_DURATION_HOURS
        ))),
        _ => Ok(()),
    }
}

/// System defaults used when a list leaves a setting unset.
#[derive(Debug, Clone, PartialEq)]
pub struct BlocklistDefaults {
    pub strike_one: u64,
    pub strike_two: u64,
    pub strike_three: u64,
    /// 0 means invites never expire.
    pub invite_expiration: u64,
    pub curse_jar_amount: u64,
}

impl Default for BlocklistDefaults {
    fn default() -> Self {
        Self {
            // A day, a week, a month
            strike_one: 24,
            strike_two: 24 * 7,
            strike_three: 24 * 30,
            invite_expiration: 24 * 7,
            // Disabled
            curse_jar_amount: 0,
        }
    }
}

/// List settings with every default filled in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveListSettings {
    pub member_invite_enabled: bool,
    pub strike_one: u64,
    pub strike_two: u64,
    pub strike_three: u64,
    pub invite_expiration: u64,
    pub curse_jar_amount: u64,
}

/// A shared blocklist, owned by exactly one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct SharedBlockedList {
    pub id: u64,
    pub owner: Channel,
    pub settings: ListSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    Pending,
    Accepted,
    Rejected,
}

impl InviteStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InviteStatus::Pending => "pending",
            InviteStatus::Accepted => "accepted",
            InviteStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(InviteStatus::Pending),
            "accepted" => Some(InviteStatus::Accepted),
            "rejected" => Some(InviteStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for InviteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which invited members `Get` should return.
///
/// On the wire this is the integer 0..=4, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum InviteStatusFilter {
    #[default]
    All,
    Pending,
    Accepted,
    Rejected,
    /// Configuration only, no members.
    None,
}

impl InviteStatusFilter {
    pub fn status(self) -> Option<InviteStatus> {
        match self {
            InviteStatusFilter::Pending => Some(InviteStatus::Pending),
            InviteStatusFilter::Accepted => Some(InviteStatus::Accepted),
            InviteStatusFilter::Rejected => Some(InviteStatus::Rejected),
            InviteStatusFilter::All | InviteStatusFilter::None => None,
        }
    }
}

impl TryFrom<u8> for InviteStatusFilter {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(InviteStatusFilter::All),
            1 => Ok(InviteStatusFilter::Pending),
            2 => Ok(InviteStatusFilter::Accepted),
            3 => Ok(InviteStatusFilter::Rejected),
            4 => Ok(InviteStatusFilter::None),
            other => Err(format!("unknown invite status filter {}", other)),
        }
    }
}

impl From<InviteStatusFilter> for u8 {
    fn from(filter: InviteStatusFilter) -> Self {
        filter as u8
    }
}

/// One invitation of a channel to a shared list.
#[derive(Debug, Clone, PartialEq)]
pub struct Invite {
    pub id: u64,
    pub list_id: u64,
    pub inviter: Channel,
    pub invitee: Channel,
    pub message: String,
    pub status: InviteStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything needed to store a new pending invite.
#[derive(Debug, Clone)]
pub struct NewInvite {
    pub list_id: u64,
    pub inviter: Channel,
    pub invitee: Channel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// What `invite` did.
#[derive(Debug, Clone, PartialEq)]
pub enum InviteOutcome {
    /// A new pending invite was stored.
    Created(Invite),
    /// The invitee already accepted an earlier invite; nothing changed.
    AlreadyMember(Invite),
}

/// What `accept`/`reject` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// The invite moved to the requested state.
    Applied,
    /// The invite was already in the requested state; nothing changed.
    Unchanged,
}

/// A channel-level block: `creator` refuses content from `blocked`.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockedEntry {
    pub creator: Channel,
    pub blocked: Channel,
    pub created_at: DateTime<Utc>,
}

/// `Get` result: configuration plus the filtered invited members.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockedListView {
    pub list: SharedBlockedList,
    pub effective: EffectiveListSettings,
    pub invited_members: Vec<Invite>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_only_touches_supplied_fields() {
        let mut settings = ListSettings {
            name: Some("Spam Hunters".to_string()),
            strike_one: Some(1),
            ..Default::default()
        };

        settings.apply(&ListSettings {
            strike_two: Some(48),
            ..Default::default()
        });

        assert_eq!(settings.name.as_deref(), Some("Spam Hunters"));
        assert_eq!(settings.strike_one, Some(1));
        assert_eq!(settings.strike_two, Some(48));
    }

    #[test]
    fn test_validation() {
        let blank = ListSettings {
            name: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(matches!(blank.validate(), Err(ModerationError::Validation(_))));

        let long_category = ListSettings {
            category: Some("x".repeat(MAX_CATEGORY_LEN + 1)),
            ..Default::default()
        };
        assert!(long_category.validate().is_err());

        // Nothing supplied is fine: every field is optional
        assert!(ListSettings::default().validate().is_ok());
    }

    #[test]
    fn test_durations_are_bounded() {
        let huge_expiration = ListSettings {
            invite_expiration: Some(3_000_000_000),
            ..Default::default()
        };
        assert!(matches!(
            huge_expiration.validate(),
            Err(ModerationError::Validation(_))
        ));

        let huge_strike = ListSettings {
            strike_three: Some(MAX_DURATION_HOURS + 1),
            ..Default::default()
        };
        assert!(huge_strike.validate().is_err());

        let at_limit = ListSettings {
            strike_three: Some(MAX_DURATION_HOURS),
            invite_expiration: Some(MAX_DURATION_HOURS),
            ..Default::default()
        };
        assert!(at_limit.validate().is_ok());
    }

    #[test]
    fn test_status_filter_wire_format() {
        let filter: InviteStatusFilter = serde_json::from_str("4").unwrap();
        assert_eq!(filter, InviteStatusFilter::None);
        assert_eq!(serde_json::to_string(&InviteStatusFilter::Accepted).unwrap(), "2");
        assert!(serde_json::from_str::<InviteStatusFilter>("9").is_err());
    }

    #[test]
    fn test_status_strings() {
        for status in [
            InviteStatus::Pending,
            InviteStatus::Accepted,
            InviteStatus::Rejected,
        ] {
            assert_eq!(InviteStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(InviteStatus::parse("expired"), None);
    }
}
