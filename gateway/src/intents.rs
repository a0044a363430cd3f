//! Gateway intent flags.

use bitflags::bitflags;

bitflags! {
    /// Bitmask declaring which event categories a shard wishes to receive,
    /// sent as part of the IDENTIFY payload.
    pub struct Intents: u32 {
        /// Guild create/update/delete/role/channel events.
        const GUILDS = 1 << 0;
        /// Guild member add/update/remove. Privileged.
        const GUILD_MEMBERS = 1 << 1;
        /// Ban add/remove.
        const GUILD_MODERATION = 1 << 2;
        /// Emoji and sticker updates.
        const GUILD_EMOJIS_AND_STICKERS = 1 << 3;
        /// Integration create/update/delete.
        const GUILD_INTEGRATIONS = 1 << 4;
        /// Webhooks update.
        const GUILD_WEBHOOKS = 1 << 5;
        /// Invite create/delete.
        const GUILD_INVITES = 1 << 6;
        /// Voice state updates.
        const GUILD_VOICE_STATES = 1 << 7;
        /// Presence updates. Privileged.
        const GUILD_PRESENCES = 1 << 8;
        /// Guild message create/update/delete.
        const GUILD_MESSAGES = 1 << 9;
        /// Guild message reaction add/remove.
        const GUILD_MESSAGE_REACTIONS = 1 << 10;
        /// Guild typing start.
        const GUILD_MESSAGE_TYPING = 1 << 11;
        /// DM create/update/delete.
        const DIRECT_MESSAGES = 1 << 12;
        /// DM reaction add/remove.
        const DIRECT_MESSAGE_REACTIONS = 1 << 13;
        /// DM typing start.
        const DIRECT_MESSAGE_TYPING = 1 << 14;
        /// Raw message content on message events. Privileged.
        const MESSAGE_CONTENT = 1 << 15;
        /// Guild scheduled event create/update/delete and user add/remove.
        const GUILD_SCHEDULED_EVENTS = 1 << 16;
    }
}

impl Default for Intents {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::Intents;

    #[test]
    fn bits_are_disjoint() {
        assert_eq!(
            Intents::GUILDS.bits() | Intents::GUILD_MESSAGES.bits(),
            (Intents::GUILDS | Intents::GUILD_MESSAGES).bits()
        );
    }
}
