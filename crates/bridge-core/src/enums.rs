//! Symbol tables mapping engine enumeration codes to names and back
//!
//! The engine identifies states and transport kinds by small integers. The
//! host program works with names. Each table is an ordered list of symbols
//! whose position is the engine code.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::error::{BridgeError, BridgeResult};

/// Name returned by [`EnumMap::id_to_name`] for codes past the end of a table
pub const UNKNOWN_ID: &str = "UNKNOWN-ID-OUT-OF-RANGE";

/// Bidirectional mapping between enumeration codes and their symbolic names
///
/// # Examples
///
/// ```rust
/// use rvoip_bridge_core::enums::{TRANSPORT_TYPES, UNKNOWN_ID};
///
/// assert_eq!(TRANSPORT_TYPES.name_to_id("UDP").unwrap(), 1);
/// assert_eq!(TRANSPORT_TYPES.id_to_name(3), "TLS");
/// assert_eq!(TRANSPORT_TYPES.id_to_name(42), UNKNOWN_ID);
/// assert!(TRANSPORT_TYPES.name_to_id("SCTP").is_err());
/// ```
#[derive(Debug, Clone)]
pub struct EnumMap {
    table: &'static str,
    names: &'static [&'static str],
    ids: HashMap<&'static str, i32>,
}

impl EnumMap {
    /// Build a table from an ordered symbol list; the index of each symbol is its code
    pub fn new(table: &'static str, names: &'static [&'static str]) -> Self {
        let ids = names
            .iter()
            .enumerate()
            .map(|(index, name)| (*name, index as i32))
            .collect();
        Self { table, names, ids }
    }

    /// Name of this table, used in error messages
    pub fn table(&self) -> &'static str {
        self.table
    }

    /// Map a code to its symbol
    pub fn id_to_name(&self, id: i32) -> &'static str {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.names.get(index))
            .copied()
            .unwrap_or(UNKNOWN_ID)
    }

    /// Map a symbol to its code
    pub fn name_to_id(&self, name: &str) -> BridgeResult<i32> {
        self.ids
            .get(name)
            .copied()
            .ok_or_else(|| BridgeError::UnknownEnumerationKey {
                key: name.to_string(),
                table: self.table,
            })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Invite session states reported in call snapshots
pub static CALL_STATES: Lazy<EnumMap> = Lazy::new(|| {
    EnumMap::new(
        "call_state",
        &[
            "NULL",
            "CALLING",
            "INCOMING",
            "EARLY",
            "CONNECTING",
            "CONFIRMED",
            "DISCONNECTED",
        ],
    )
});

/// Media status of a call
pub static MEDIA_STATUSES: Lazy<EnumMap> = Lazy::new(|| {
    EnumMap::new(
        "media_status",
        &["NONE", "ACTIVE", "LOCAL_HOLD", "REMOTE_HOLD", "ERROR"],
    )
});

/// Transport kinds accepted by the engine
pub static TRANSPORT_TYPES: Lazy<EnumMap> =
    Lazy::new(|| EnumMap::new("transport_type", &["UNSPECIFIED", "UDP", "TCP", "TLS"]));

/// Event subscription states (presence, MWI, REFER)
pub static SUBSCRIPTION_STATES: Lazy<EnumMap> = Lazy::new(|| {
    EnumMap::new(
        "subscription_state",
        &[
            "NULL",
            "SENT",
            "ACCEPTED",
            "PENDING",
            "ACTIVE",
            "TERMINATED",
            "UNKNOWN",
        ],
    )
});
