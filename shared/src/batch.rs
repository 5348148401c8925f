use rooknet_serde::{read_varint, write_varint, BitReader, BitWrite, Serde, SerdeErr};

use crate::{
    delta::{DeltaCodec, IntDelta},
    identity::{NetworkId, PlayerId, SceneId},
};

/// One creation record in a spawn/despawn batch. `kind` names the
/// archetype/prefab the receiving side instantiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpawnRecord {
    pub network_id: NetworkId,
    pub owner: PlayerId,
    pub kind: u16,
}

/// One removal record in a spawn/despawn batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DespawnRecord {
    pub network_id: NetworkId,
}

/// An ordered list of creations and removals for one scene. Each record is
/// delta-encoded against the previous record of the same kind *within this
/// batch*, not against per-connection history, so the first record of each
/// kind is always a full (zero-baseline) encode and a batch decodes without
/// any prior state. Consecutively spawned ids differ by small steps, which
/// is what makes the intra-batch delta worthwhile.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpawnBatch {
    pub scene: SceneId,
    pub spawns: Vec<SpawnRecord>,
    pub despawns: Vec<DespawnRecord>,
}

impl SpawnBatch {
    pub fn new(scene: SceneId) -> Self {
        Self {
            scene,
            spawns: Vec::new(),
            despawns: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.spawns.is_empty() && self.despawns.is_empty()
    }

    pub fn ser(&self, writer: &mut dyn BitWrite) {
        self.scene.ser(writer);

        write_varint(writer, self.spawns.len() as u64);
        let mut previous = SpawnRecord::default();
        for record in &self.spawns {
            ser_spawn_delta(writer, &previous, record);
            previous = *record;
        }

        write_varint(writer, self.despawns.len() as u64);
        let mut previous = DespawnRecord::default();
        for record in &self.despawns {
            ser_despawn_delta(writer, &previous, record);
            previous = *record;
        }
    }

    pub fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let scene = SceneId::de(reader)?;

        let spawn_count = read_varint(reader)?;
        let mut spawns = Vec::new();
        let mut previous = SpawnRecord::default();
        for _ in 0..spawn_count {
            let record = de_spawn_delta(reader, scene, &previous)?;
            spawns.push(record);
            previous = record;
        }

        let despawn_count = read_varint(reader)?;
        let mut despawns = Vec::new();
        let mut previous = DespawnRecord::default();
        for _ in 0..despawn_count {
            let record = de_despawn_delta(reader, scene, &previous)?;
            despawns.push(record);
            previous = record;
        }

        Ok(Self {
            scene,
            spawns,
            despawns,
        })
    }
}

// Records omit the scene on the wire: the batch header already carries it.

fn ser_network_id_delta(writer: &mut dyn BitWrite, previous: &NetworkId, current: &NetworkId) {
    IntDelta.write_delta(
        writer,
        &previous.spawner().value(),
        &current.spawner().value(),
    );
    writer.write_bit(current.spawner().is_bot());
    IntDelta.write_delta(writer, &previous.value(), &current.value());
}

fn de_network_id_delta(
    reader: &mut BitReader,
    scene: SceneId,
    previous: &NetworkId,
) -> Result<NetworkId, SerdeErr> {
    let spawner_value = IntDelta.read_delta(reader, &previous.spawner().value())?;
    let spawner_bot = reader.read_bit()?;
    let value = IntDelta.read_delta(reader, &previous.value())?;

    let spawner = if spawner_bot {
        PlayerId::new_bot(spawner_value)
    } else {
        PlayerId::new(spawner_value)
    };
    Ok(NetworkId::new(scene, spawner, value))
}

fn ser_spawn_delta(writer: &mut dyn BitWrite, previous: &SpawnRecord, current: &SpawnRecord) {
    ser_network_id_delta(writer, &previous.network_id, &current.network_id);
    IntDelta.write_delta(writer, &previous.owner.value(), &current.owner.value());
    writer.write_bit(current.owner.is_bot());
    IntDelta.write_delta(writer, &previous.kind, &current.kind);
}

fn de_spawn_delta(
    reader: &mut BitReader,
    scene: SceneId,
    previous: &SpawnRecord,
) -> Result<SpawnRecord, SerdeErr> {
    let network_id = de_network_id_delta(reader, scene, &previous.network_id)?;
    let owner_value = IntDelta.read_delta(reader, &previous.owner.value())?;
    let owner_bot = reader.read_bit()?;
    let kind = IntDelta.read_delta(reader, &previous.kind)?;

    let owner = if owner_bot {
        PlayerId::new_bot(owner_value)
    } else {
        PlayerId::new(owner_value)
    };
    Ok(SpawnRecord {
        network_id,
        owner,
        kind,
    })
}

fn ser_despawn_delta(writer: &mut dyn BitWrite, previous: &DespawnRecord, current: &DespawnRecord) {
    ser_network_id_delta(writer, &previous.network_id, &current.network_id);
}

fn de_despawn_delta(
    reader: &mut BitReader,
    scene: SceneId,
    previous: &DespawnRecord,
) -> Result<DespawnRecord, SerdeErr> {
    let network_id = de_network_id_delta(reader, scene, &previous.network_id)?;
    Ok(DespawnRecord { network_id })
}
