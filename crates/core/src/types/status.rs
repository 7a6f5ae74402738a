//! Status enums for connections, sync runs, and synced entities.
//!
//! All of these are persisted as `TEXT` columns, so each one round-trips
//! through `as_str()` / `FromStr` using the same snake_case spelling that
//! serde uses on the wire.

use serde::{Deserialize, Serialize};

/// Implements `as_str`, `Display`, and `FromStr` for a unit-only enum.
macro_rules! text_enum {
    ($name:ident, $label:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Wire/database spelling of this value.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(format!(concat!("invalid ", $label, ": {}"), s)),
                }
            }
        }
    };
}

/// Whether a store connection is live.
///
/// Disconnecting is a status flip; connections are never hard-deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Connected,
    Disconnected,
}

text_enum!(ConnectionStatus, "connection status", {
    Connected => "connected",
    Disconnected => "disconnected",
});

/// Advisory sync flag on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
}

text_enum!(SyncStatus, "sync status", {
    Idle => "idle",
    Syncing => "syncing",
});

/// Outcome of a single sync run, as recorded in sync history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncRunStatus {
    /// Run has started and not yet completed.
    Running,
    /// Every item synced.
    Success,
    /// Some items synced, some failed.
    Partial,
    /// Nothing synced and at least one error occurred.
    Failed,
}

text_enum!(SyncRunStatus, "sync run status", {
    Running => "running",
    Success => "success",
    Partial => "partial",
    Failed => "failed",
});

impl SyncRunStatus {
    /// Classify a finished run from its counters.
    #[must_use]
    pub const fn from_counts(items_synced: u32, items_failed: u32, error_count: usize) -> Self {
        if items_failed == 0 && error_count == 0 {
            Self::Success
        } else if items_synced > 0 {
            Self::Partial
        } else {
            Self::Failed
        }
    }
}

/// Normalized product status.
///
/// Platform-native statuses are mapped onto these three values; the original
/// string is kept in the product metadata under `platform_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    #[default]
    Active,
    Inactive,
    Draft,
}

text_enum!(ProductStatus, "product status", {
    Active => "active",
    Inactive => "inactive",
    Draft => "draft",
});

/// Entity kinds a sync run can cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncType {
    Products,
    Orders,
    Customers,
}

text_enum!(SyncType, "sync type", {
    Products => "products",
    Orders => "orders",
    Customers => "customers",
});

impl SyncType {
    /// Every sync type, in the order a full sync processes them.
    pub const ALL: [Self; 3] = [Self::Products, Self::Orders, Self::Customers];
}
