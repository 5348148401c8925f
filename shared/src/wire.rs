use rooknet_serde::{BitReader, BitWrite, ConstBitLength, Serde, SerdeErr};

use crate::{
    identity::{Cookie, NetworkId, PlayerId},
    types::ConnectionId,
};

// PacketType

/// Leading discriminant of every packet, so one receive entry point can
/// route the payload to the right decoder.
#[derive(Copy, Debug, Clone, Eq, PartialEq)]
pub enum PacketType {
    /// Server → new client: its identity, once per successful authentication
    LoginResponse,
    /// Server → new client: every currently-connected player
    PlayerSnapshot,
    /// Server → all clients: a player joined
    PlayerJoined,
    /// Server → all clients: a player left
    PlayerLeft,
    /// Server → all clients: a replicated object changed owner
    Ownership,
    /// Spawn/despawn records for one scene
    SpawnBatch,
    /// A remote procedure call envelope
    Rpc,
}

impl PacketType {
    pub fn index(&self) -> u64 {
        match self {
            PacketType::LoginResponse => 0,
            PacketType::PlayerSnapshot => 1,
            PacketType::PlayerJoined => 2,
            PacketType::PlayerLeft => 3,
            PacketType::Ownership => 4,
            PacketType::SpawnBatch => 5,
            PacketType::Rpc => 6,
        }
    }
}

impl Serde for PacketType {
    fn ser(&self, writer: &mut dyn BitWrite) {
        writer.write_bits(self.index(), 3);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        match reader.read_bits(3)? {
            0 => Ok(PacketType::LoginResponse),
            1 => Ok(PacketType::PlayerSnapshot),
            2 => Ok(PacketType::PlayerJoined),
            3 => Ok(PacketType::PlayerLeft),
            4 => Ok(PacketType::Ownership),
            5 => Ok(PacketType::SpawnBatch),
            6 => Ok(PacketType::Rpc),
            _ => Err(SerdeErr::InvalidValue {
                type_name: "PacketType",
            }),
        }
    }

    fn bit_length(&self) -> u32 {
        Self::const_bit_length()
    }
}

impl ConstBitLength for PacketType {
    fn const_bit_length() -> u32 {
        3
    }
}

// Join handshake

/// Unicast to a freshly authenticated client. `last_network_id` seeds the
/// client's own identity allocator so its subsequently-spawned objects
/// cannot collide with server-assigned ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerLoginResponse {
    pub player_id: PlayerId,
    pub last_network_id: u16,
}

impl Serde for ServerLoginResponse {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.player_id.ser(writer);
        self.last_network_id.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            player_id: PlayerId::de(reader)?,
            last_network_id: u16::de(reader)?,
        })
    }

    fn bit_length(&self) -> u32 {
        self.player_id.bit_length() + self.last_network_id.bit_length()
    }
}

/// One player as seen by a joiner or a join broadcast. The cookie and
/// identity-allocator state are sensitive: they are populated only when
/// host-migration support is enabled, because a promoted client needs them
/// to carry the session forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerJoinedEvent {
    pub player_id: PlayerId,
    pub connection: Option<ConnectionId>,
    pub last_network_id: Option<u16>,
    pub cookie: Option<Cookie>,
    /// Whether this join recovered a previous session via its cookie.
    pub reconnect: bool,
}

impl Serde for PlayerJoinedEvent {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.player_id.ser(writer);
        self.connection.ser(writer);
        self.last_network_id.ser(writer);
        self.cookie.ser(writer);
        self.reconnect.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            player_id: PlayerId::de(reader)?,
            connection: Option::<ConnectionId>::de(reader)?,
            last_network_id: Option::<u16>::de(reader)?,
            cookie: Option::<Cookie>::de(reader)?,
            reconnect: bool::de(reader)?,
        })
    }

    fn bit_length(&self) -> u32 {
        self.player_id.bit_length()
            + self.connection.bit_length()
            + self.last_network_id.bit_length()
            + self.cookie.bit_length()
            + self.reconnect.bit_length()
    }
}

/// Unicast to a new arrival right after the login response: the full set of
/// currently-connected players.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSnapshotEvent {
    pub players: Vec<PlayerJoinedEvent>,
}

impl Serde for PlayerSnapshotEvent {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.players.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            players: Vec::<PlayerJoinedEvent>::de(reader)?,
        })
    }

    fn bit_length(&self) -> u32 {
        self.players.bit_length()
    }
}

/// Broadcast when a player's session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerLeftEvent {
    pub player_id: PlayerId,
}

impl Serde for PlayerLeftEvent {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.player_id.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            player_id: PlayerId::de(reader)?,
        })
    }

    fn bit_length(&self) -> u32 {
        self.player_id.bit_length()
    }
}

/// Broadcast when a replicated object changes owner. `owner == None` means
/// ownership was removed without a successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnershipEvent {
    pub network_id: NetworkId,
    pub owner: Option<PlayerId>,
}

impl Serde for OwnershipEvent {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.network_id.ser(writer);
        self.owner.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            network_id: NetworkId::de(reader)?,
            owner: Option::<PlayerId>::de(reader)?,
        })
    }

    fn bit_length(&self) -> u32 {
        self.network_id.bit_length() + self.owner.bit_length()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        OwnershipEvent, PacketType, PlayerJoinedEvent, PlayerLeftEvent, PlayerSnapshotEvent,
        ServerLoginResponse,
    };
    use crate::{
        identity::{Cookie, NetworkId, PlayerId, SceneId},
        types::ConnectionId,
    };
    use rooknet_serde::{BitReader, BitWrite, BitWriter, Serde, SerdeErr};

    #[test]
    fn handshake_round_trips() {
        let in_login = ServerLoginResponse {
            player_id: PlayerId::new(4),
            last_network_id: 117,
        };
        let in_snapshot = PlayerSnapshotEvent {
            players: vec![
                PlayerJoinedEvent {
                    player_id: PlayerId::new(1),
                    connection: Some(ConnectionId::new(900)),
                    last_network_id: Some(20),
                    cookie: Some(Cookie::new("ab12cd34")),
                    reconnect: false,
                },
                PlayerJoinedEvent {
                    player_id: PlayerId::new_bot(2),
                    connection: None,
                    last_network_id: None,
                    cookie: None,
                    reconnect: false,
                },
            ],
        };

        let mut writer = BitWriter::new();
        in_login.ser(&mut writer);
        in_snapshot.ser(&mut writer);
        let buffer = writer.to_bytes();

        let mut reader = BitReader::new(&buffer);
        assert_eq!(ServerLoginResponse::de(&mut reader).unwrap(), in_login);
        assert_eq!(PlayerSnapshotEvent::de(&mut reader).unwrap(), in_snapshot);
    }

    #[test]
    fn events_round_trip() {
        let in_left = PlayerLeftEvent {
            player_id: PlayerId::new(9),
        };
        let in_ownership = OwnershipEvent {
            network_id: NetworkId::new(SceneId::new(1), PlayerId::new(1), 42),
            owner: Some(PlayerId::new(2)),
        };

        let mut writer = BitWriter::new();
        PacketType::PlayerLeft.ser(&mut writer);
        in_left.ser(&mut writer);
        PacketType::Ownership.ser(&mut writer);
        in_ownership.ser(&mut writer);
        let buffer = writer.to_bytes();

        let mut reader = BitReader::new(&buffer);
        assert_eq!(PacketType::de(&mut reader).unwrap(), PacketType::PlayerLeft);
        assert_eq!(PlayerLeftEvent::de(&mut reader).unwrap(), in_left);
        assert_eq!(PacketType::de(&mut reader).unwrap(), PacketType::Ownership);
        assert_eq!(OwnershipEvent::de(&mut reader).unwrap(), in_ownership);
    }

    #[test]
    fn unknown_packet_type_is_rejected() {
        let mut writer = BitWriter::new();
        writer.write_bits(7, 3);
        let buffer = writer.to_bytes();

        let mut reader = BitReader::new(&buffer);
        assert_eq!(
            PacketType::de(&mut reader),
            Err(SerdeErr::InvalidValue {
                type_name: "PacketType"
            })
        );
    }
}
