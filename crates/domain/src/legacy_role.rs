//! Legacy role tiers and their identity provider role equivalents.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::LazyLock;

use idbridge_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Historical internal role category with exactly one identity provider role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegacyTier {
    /// Regular tenant member.
    User,
    /// Team or department manager.
    Manager,
    /// Tenant administrator.
    Admin,
    /// Cross-tenant operator.
    SuperAdmin,
}

impl LegacyTier {
    /// Returns a stable name for this tier.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Manager => "manager",
            Self::Admin => "admin",
            Self::SuperAdmin => "super_admin",
        }
    }

    /// Returns all tiers in table order.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[LegacyTier] = &[
            LegacyTier::User,
            LegacyTier::Manager,
            LegacyTier::Admin,
            LegacyTier::SuperAdmin,
        ];

        ALL
    }

    fn index(self) -> usize {
        match self {
            Self::User => 0,
            Self::Manager => 1,
            Self::Admin => 2,
            Self::SuperAdmin => 3,
        }
    }
}

impl Display for LegacyTier {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for LegacyTier {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "manager" => Ok(Self::Manager),
            "admin" => Ok(Self::Admin),
            "super_admin" => Ok(Self::SuperAdmin),
            _ => Err(AppError::Validation(format!(
                "unknown legacy tier '{value}'"
            ))),
        }
    }
}

/// Role identifier in the external identity provider.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdpRoleId(String);

impl IdpRoleId {
    /// Creates a validated identity provider role identifier.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "identity provider role id must not be empty".to_owned(),
            ));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for IdpRoleId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<IdpRoleId> for String {
    fn from(value: IdpRoleId) -> Self {
        value.0
    }
}

impl Display for IdpRoleId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

struct StandardTier {
    tier: LegacyTier,
    internal_role_ids: &'static [&'static str],
    idp_role_id: &'static str,
}

// Directory role ids recognised by each tier. The account-owner role grants
// both admin and super_admin access.
const ACCOUNT_OWNER_ROLE_ID: &str = "0f9b3d52-7a1e-4c63-9a2f-5d8e41c07b19";

const STANDARD_TIERS: [StandardTier; 4] = [
    StandardTier {
        tier: LegacyTier::User,
        internal_role_ids: &[
            "3c6f1a27-84d2-4b0e-b5a1-2e9d7c40f816",
            "8d2e5b90-1f4a-4c7d-93e6-a07b2c5d1e34",
            "c41a7e03-5b96-4f28-8d1c-6e3f90a2b757",
        ],
        idp_role_id: "rol_Xq3vL8mT2pW9sKd1",
    },
    StandardTier {
        tier: LegacyTier::Manager,
        internal_role_ids: &[
            "5e8a2c14-9d3b-4a71-b6f0-1c7e48d2a903",
            "a93d6f58-2c0e-4b1a-8f47-d5b2e16c3a80",
        ],
        idp_role_id: "rol_Bn7cR4yH0eZ6uJf5",
    },
    StandardTier {
        tier: LegacyTier::Admin,
        internal_role_ids: &[
            "e27b4d91-6a3c-4f05-9b8e-3d1f72c0a5e6",
            ACCOUNT_OWNER_ROLE_ID,
        ],
        idp_role_id: "rol_Gt2kP9wM6aQ3xNv8",
    },
    StandardTier {
        tier: LegacyTier::SuperAdmin,
        internal_role_ids: &[
            "71c5e0a8-3f2d-4b96-a4e1-8b6d09f3c27a",
            ACCOUNT_OWNER_ROLE_ID,
        ],
        idp_role_id: "rol_Ls5dF1jV7hC4bYe0",
    },
];

static STANDARD_MAPPING: LazyLock<LegacyRoleMapping> = LazyLock::new(|| {
    let mut tiers = STANDARD_TIERS.map(|entry| {
        let mapping = LegacyTierMapping {
            internal_role_ids: entry
                .internal_role_ids
                .iter()
                .map(|value| (*value).to_owned())
                .collect(),
            idp_role_id: IdpRoleId(entry.idp_role_id.to_owned()),
        };
        (entry.tier, mapping)
    });
    tiers.sort_by_key(|(tier, _)| *tier);

    LegacyRoleMapping {
        tiers: tiers.map(|(_, mapping)| mapping),
    }
});

#[derive(Debug, Clone, PartialEq, Eq)]
struct LegacyTierMapping {
    internal_role_ids: BTreeSet<String>,
    idp_role_id: IdpRoleId,
}

/// Immutable table from legacy tier to recognised internal roles and one
/// identity provider role.
///
/// The table always covers every [`LegacyTier`]. Tier membership is not
/// exclusive: the same internal role may appear under several tiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyRoleMapping {
    tiers: [LegacyTierMapping; 4],
}

impl LegacyRoleMapping {
    /// Returns the built-in process-wide mapping.
    #[must_use]
    pub fn standard() -> &'static Self {
        &STANDARD_MAPPING
    }

    /// Builds a custom mapping. Every tier must be listed exactly once.
    pub fn new(
        entries: impl IntoIterator<Item = (LegacyTier, Vec<String>, IdpRoleId)>,
    ) -> AppResult<Self> {
        let mut slots: [Option<LegacyTierMapping>; 4] = Default::default();

        for (tier, internal_role_ids, idp_role_id) in entries {
            let slot = &mut slots[tier.index()];
            if slot.is_some() {
                return Err(AppError::Validation(format!(
                    "legacy role mapping lists tier '{tier}' more than once"
                )));
            }

            if internal_role_ids.iter().any(|value| value.trim().is_empty()) {
                return Err(AppError::Validation(format!(
                    "legacy role mapping tier '{tier}' contains a blank internal role id"
                )));
            }

            *slot = Some(LegacyTierMapping {
                internal_role_ids: internal_role_ids.into_iter().collect(),
                idp_role_id,
            });
        }

        let [user, manager, admin, super_admin] = slots;
        let missing = |tier: LegacyTier| {
            AppError::Validation(format!("legacy role mapping is missing tier '{tier}'"))
        };

        Ok(Self {
            tiers: [
                user.ok_or_else(|| missing(LegacyTier::User))?,
                manager.ok_or_else(|| missing(LegacyTier::Manager))?,
                admin.ok_or_else(|| missing(LegacyTier::Admin))?,
                super_admin.ok_or_else(|| missing(LegacyTier::SuperAdmin))?,
            ],
        })
    }

    /// Returns a copy with the identity provider role for one tier replaced.
    #[must_use]
    pub fn with_idp_role_id(mut self, tier: LegacyTier, idp_role_id: IdpRoleId) -> Self {
        self.tiers[tier.index()].idp_role_id = idp_role_id;
        self
    }

    /// Maps internal role identifiers to the set of identity provider roles.
    ///
    /// Each identifier is checked against every tier independently and
    /// unrecognised identifiers are ignored.
    #[must_use]
    pub fn map_roles<I, S>(&self, internal_role_ids: I) -> BTreeSet<IdpRoleId>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut mapped = BTreeSet::new();
        for internal_role_id in internal_role_ids {
            let internal_role_id = internal_role_id.as_ref();
            for tier in &self.tiers {
                if tier.internal_role_ids.contains(internal_role_id) {
                    mapped.insert(tier.idp_role_id.clone());
                }
            }
        }

        mapped
    }

    /// Returns every tier that recognises the internal role.
    #[must_use]
    pub fn tiers_for(&self, internal_role_id: &str) -> Vec<LegacyTier> {
        LegacyTier::all()
            .iter()
            .copied()
            .filter(|tier| {
                self.tiers[tier.index()]
                    .internal_role_ids
                    .contains(internal_role_id)
            })
            .collect()
    }

    /// Returns the identity provider role for a tier.
    #[must_use]
    pub fn idp_role_id(&self, tier: LegacyTier) -> &IdpRoleId {
        &self.tiers[tier.index()].idp_role_id
    }

    /// Returns the internal roles recognised by a tier.
    #[must_use]
    pub fn internal_role_ids(&self, tier: LegacyTier) -> &BTreeSet<String> {
        &self.tiers[tier.index()].internal_role_ids
    }
}
