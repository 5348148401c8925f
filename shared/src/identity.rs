use rooknet_serde::{
    read_varint, write_varint, BitReader, BitWrite, ConstBitLength, Serde, SerdeErr,
};

// PlayerId

/// Identity of a player for the lifetime of one session. The value is
/// allocated monotonically by the session registry; a reconnecting player
/// recovers the same id through their cookie. Bots are locally-created
/// players that have no transport connection.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, PartialOrd, Ord, Default)]
pub struct PlayerId {
    value: u16,
    bot: bool,
}

impl PlayerId {
    /// Sentinel used to address the server itself as an RPC target.
    pub const SERVER: PlayerId = PlayerId {
        value: u16::MAX,
        bot: false,
    };

    pub fn new(value: u16) -> Self {
        Self { value, bot: false }
    }

    pub fn new_bot(value: u16) -> Self {
        Self { value, bot: true }
    }

    pub fn value(&self) -> u16 {
        self.value
    }

    pub fn is_bot(&self) -> bool {
        self.bot
    }

    pub fn is_server_sentinel(&self) -> bool {
        *self == Self::SERVER
    }
}

impl Serde for PlayerId {
    fn ser(&self, writer: &mut dyn BitWrite) {
        write_varint(writer, u64::from(self.value));
        writer.write_bit(self.bot);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let raw = read_varint(reader)?;
        let value = u16::try_from(raw).map_err(|_| SerdeErr::InvalidValue {
            type_name: "PlayerId",
        })?;
        let bot = reader.read_bit()?;
        Ok(Self { value, bot })
    }

    fn bit_length(&self) -> u32 {
        let mut value = self.value;
        let mut groups = 1;
        while value >= 128 {
            value >>= 7;
            groups += 1;
        }
        groups * 8 + 1
    }
}

// SceneId

/// Identifies one replicated scene. Network identities are unique within
/// their scene, not globally.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, PartialOrd, Ord, Default)]
pub struct SceneId(u16);

impl SceneId {
    pub fn new(value: u16) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u16 {
        self.0
    }
}

impl Serde for SceneId {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.0.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self(u16::de(reader)?))
    }

    fn bit_length(&self) -> u32 {
        Self::const_bit_length()
    }
}

impl ConstBitLength for SceneId {
    fn const_bit_length() -> u32 {
        16
    }
}

// NetworkId

/// Identity of a replicated object: a numeric value scoped by the player
/// that spawned it and the scene it lives in. Values are recycled only
/// after despawn, with a cool-off so late packets cannot alias a fresh
/// object.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, PartialOrd, Ord, Default)]
pub struct NetworkId {
    scene: SceneId,
    spawner: PlayerId,
    value: u16,
}

impl NetworkId {
    pub fn new(scene: SceneId, spawner: PlayerId, value: u16) -> Self {
        Self {
            scene,
            spawner,
            value,
        }
    }

    pub fn scene(&self) -> SceneId {
        self.scene
    }

    pub fn spawner(&self) -> PlayerId {
        self.spawner
    }

    pub fn value(&self) -> u16 {
        self.value
    }
}

impl Serde for NetworkId {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.scene.ser(writer);
        self.spawner.ser(writer);
        self.value.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            scene: SceneId::de(reader)?,
            spawner: PlayerId::de(reader)?,
            value: u16::de(reader)?,
        })
    }

    fn bit_length(&self) -> u32 {
        self.scene.bit_length() + self.spawner.bit_length() + self.value.bit_length()
    }
}

// Cookie

/// Opaque reconnection token. The server hands one out on first join; a
/// client presenting it on a later connection recovers its previous
/// [`PlayerId`] instead of being treated as a fresh arrival.
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct Cookie(String);

impl Cookie {
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Serde for Cookie {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.0.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self(String::de(reader)?))
    }

    fn bit_length(&self) -> u32 {
        self.0.bit_length()
    }
}

#[cfg(test)]
mod tests {
    use super::{Cookie, NetworkId, PlayerId, SceneId};
    use rooknet_serde::{BitReader, BitWriter, Serde};

    #[test]
    fn identity_round_trips() {
        let in_player = PlayerId::new(300);
        let in_bot = PlayerId::new_bot(3);
        let in_network = NetworkId::new(SceneId::new(2), in_player, 42);
        let in_cookie = Cookie::new("d41d8cd98f");

        let mut writer = BitWriter::new();
        in_player.ser(&mut writer);
        in_bot.ser(&mut writer);
        in_network.ser(&mut writer);
        in_cookie.ser(&mut writer);
        let buffer = writer.to_bytes();

        let mut reader = BitReader::new(&buffer);
        assert_eq!(PlayerId::de(&mut reader).unwrap(), in_player);
        assert_eq!(PlayerId::de(&mut reader).unwrap(), in_bot);
        assert_eq!(NetworkId::de(&mut reader).unwrap(), in_network);
        assert_eq!(Cookie::de(&mut reader).unwrap(), in_cookie);
    }

    #[test]
    fn server_sentinel_is_not_a_bot() {
        assert!(PlayerId::SERVER.is_server_sentinel());
        assert!(!PlayerId::SERVER.is_bot());
        assert!(!PlayerId::new(5).is_server_sentinel());
    }
}
