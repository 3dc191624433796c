//! Gateway intents bitflags
//!
//! Intents select which event groups the server will dispatch to this
//! client. They are declared once, in the Identify payload.

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

bitflags! {
    /// Event subscription flags sent at identify time
    ///
    /// Serialized as a plain integer on the wire.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Intents: u64 {
        /// Guild create/update/delete and channel lifecycle events
        const GUILDS                  = 1 << 0;
        /// Member join/leave/update events
        const GUILD_MEMBERS           = 1 << 1;
        /// Message create/update/delete in guild channels
        const GUILD_MESSAGES          = 1 << 9;
        /// Reaction events in guild channels
        const GUILD_MESSAGE_REACTIONS = 1 << 10;
        /// Message events in direct messages
        const DIRECT_MESSAGES         = 1 << 12;

        /// Subscriptions the relay needs for message sync
        const DEFAULT = Self::GUILDS.bits() | Self::GUILD_MESSAGES.bits();
    }
}

impl Serialize for Intents {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(self.bits())
    }
}

impl<'de> Deserialize<'de> for Intents {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = u64::deserialize(deserializer)?;
        // Keep unknown bits so a newer peer's flags survive a round trip
        Ok(Self::from_bits_retain(bits))
    }
}

impl std::fmt::Display for Intents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.bits())
    }
}
