use log::info;
use rooknet_shared::{PlayerId, Role};

use crate::context::NetContext;

/// Which callback lists a module joins. Lists are rebuilt from these flags
/// whenever modules are (re)registered for a role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub connection_events: bool,
    pub update: bool,
    pub fixed_update: bool,
    pub batch: bool,
    pub cleanup: bool,
    pub promote: bool,
    pub transfer: bool,
}

impl Capabilities {
    pub const NONE: Capabilities = Capabilities {
        connection_events: false,
        update: false,
        fixed_update: false,
        batch: false,
        cleanup: false,
        promote: false,
        transfer: false,
    };

    pub fn with_connection_events(mut self) -> Self {
        self.connection_events = true;
        self
    }

    pub fn with_update(mut self) -> Self {
        self.update = true;
        self
    }

    pub fn with_fixed_update(mut self) -> Self {
        self.fixed_update = true;
        self
    }

    pub fn with_batch(mut self) -> Self {
        self.batch = true;
        self
    }

    pub fn with_cleanup(mut self) -> Self {
        self.cleanup = true;
        self
    }

    pub fn with_promote(mut self) -> Self {
        self.promote = true;
        self
    }

    pub fn with_transfer(mut self) -> Self {
        self.transfer = true;
        self
    }
}

/// A typed behavior plugged into the orchestrator. Every callback is
/// optional; [`NetModule::capabilities`] declares which phase lists the
/// module joins. Callback order within a list equals registration order.
#[allow(unused_variables)]
pub trait NetModule {
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    fn on_enable(&mut self, ctx: &mut NetContext) {}

    fn on_disable(&mut self, ctx: &mut NetContext) {}

    // Connection events

    fn on_player_joined(&mut self, ctx: &mut NetContext, player: PlayerId, reconnect: bool) {}

    fn on_player_left_pre(&mut self, ctx: &mut NetContext, player: PlayerId) {}

    fn on_player_left(&mut self, ctx: &mut NetContext, player: PlayerId) {}

    fn on_player_left_post(&mut self, ctx: &mut NetContext, player: PlayerId) {}

    // Per-frame

    fn update(&mut self, ctx: &mut NetContext, delta_seconds: f32) {}

    // Per-tick, in global phase order

    fn pre_fixed_update(&mut self, ctx: &mut NetContext) {}

    fn fixed_update(&mut self, ctx: &mut NetContext) {}

    fn post_fixed_update(&mut self, ctx: &mut NetContext) {}

    fn batch(&mut self, ctx: &mut NetContext) {}

    fn post_batch(&mut self, ctx: &mut NetContext) {}

    fn cleanup(&mut self, ctx: &mut NetContext) {}

    // Host migration

    fn promote_to_server(&mut self, ctx: &mut NetContext) {}

    fn post_promote_to_server(&mut self, ctx: &mut NetContext) {}

    fn transfer_to_new_server(&mut self, ctx: &mut NetContext, new_server: PlayerId) {}

    fn post_transfer(&mut self, ctx: &mut NetContext) {}
}

/// Explicit module lifecycle, decoupled from any engine object model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Unregistered,
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MigrationState {
    Idle,
    Promoting,
    Transferring,
}

struct ModuleEntry {
    module: Box<dyn NetModule>,
    state: ModuleState,
}

#[derive(Default)]
struct PhaseLists {
    connection_events: Vec<usize>,
    update: Vec<usize>,
    fixed_update: Vec<usize>,
    batch: Vec<usize>,
    cleanup: Vec<usize>,
    promote: Vec<usize>,
    transfer: Vec<usize>,
}

/// Composes registered modules into typed callback phases, and drives the
/// role swaps that make host migration possible: while a promotion or
/// transfer is in flight, modules are migrated in place instead of being
/// torn down and rebuilt, carrying their in-memory replication state
/// across the role boundary.
pub struct ModuleOrchestrator {
    entries: Vec<ModuleEntry>,
    lists: PhaseLists,
    role: Role,
    migration: MigrationState,
}

impl ModuleOrchestrator {
    pub fn new(role: Role) -> Self {
        Self {
            entries: Vec::new(),
            lists: PhaseLists::default(),
            role,
            migration: MigrationState::Idle,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn module_count(&self) -> usize {
        self.entries.len()
    }

    pub fn module_state(&self, name: &str) -> Option<ModuleState> {
        self.entries
            .iter()
            .find(|entry| entry.module.name() == name)
            .map(|entry| entry.state)
    }

    /// Registers and enables a module for the current role.
    pub fn register(&mut self, ctx: &mut NetContext, mut module: Box<dyn NetModule>) {
        module.on_enable(ctx);
        self.entries.push(ModuleEntry {
            module,
            state: ModuleState::Enabled,
        });
        self.rebuild_lists();
    }

    fn rebuild_lists(&mut self) {
        self.lists = PhaseLists::default();
        for (index, entry) in self.entries.iter().enumerate() {
            let capabilities = entry.module.capabilities();
            if capabilities.connection_events {
                self.lists.connection_events.push(index);
            }
            if capabilities.update {
                self.lists.update.push(index);
            }
            if capabilities.fixed_update {
                self.lists.fixed_update.push(index);
            }
            if capabilities.batch {
                self.lists.batch.push(index);
            }
            if capabilities.cleanup {
                self.lists.cleanup.push(index);
            }
            if capabilities.promote {
                self.lists.promote.push(index);
            }
            if capabilities.transfer {
                self.lists.transfer.push(index);
            }
        }
    }

    /// Swaps the registered role outside of a migration: every module is
    /// disabled as the old role and re-enabled as the new one. During a
    /// migration the existing modules are kept as-is; the promotion
    /// sequence handles their transition itself.
    pub fn set_role(&mut self, ctx: &mut NetContext, role: Role) {
        if self.role == role {
            return;
        }
        self.role = role;

        if self.migration != MigrationState::Idle {
            return;
        }

        for entry in &mut self.entries {
            entry.module.on_disable(ctx);
            entry.state = ModuleState::Disabled;
        }
        for entry in &mut self.entries {
            entry.module.on_enable(ctx);
            entry.state = ModuleState::Enabled;
        }
        self.rebuild_lists();
    }

    // Phase drivers. Within one list, callback order equals registration
    // order; phases run in a fixed global order.

    /// One replication tick: pre-fixed-update → fixed-update →
    /// post-fixed-update → batch → post-batch.
    pub fn tick(&mut self, ctx: &mut NetContext) {
        for &index in &self.lists.fixed_update {
            self.entries[index].module.pre_fixed_update(ctx);
        }
        for &index in &self.lists.fixed_update {
            self.entries[index].module.fixed_update(ctx);
        }
        for &index in &self.lists.fixed_update {
            self.entries[index].module.post_fixed_update(ctx);
        }
        for &index in &self.lists.batch {
            self.entries[index].module.batch(ctx);
        }
        for &index in &self.lists.batch {
            self.entries[index].module.post_batch(ctx);
        }
    }

    /// One render frame.
    pub fn frame(&mut self, ctx: &mut NetContext, delta_seconds: f32) {
        for &index in &self.lists.update {
            self.entries[index].module.update(ctx, delta_seconds);
        }
    }

    pub fn cleanup(&mut self, ctx: &mut NetContext) {
        for &index in &self.lists.cleanup {
            self.entries[index].module.cleanup(ctx);
        }
    }

    pub fn player_joined(&mut self, ctx: &mut NetContext, player: PlayerId, reconnect: bool) {
        for &index in &self.lists.connection_events {
            self.entries[index]
                .module
                .on_player_joined(ctx, player, reconnect);
        }
    }

    /// The three leave phases are separate so the runtime can apply its
    /// leave policy (despawn or release the departing player's objects)
    /// after every module's pre hook and before the main hooks.
    pub fn player_left_pre(&mut self, ctx: &mut NetContext, player: PlayerId) {
        for &index in &self.lists.connection_events {
            self.entries[index].module.on_player_left_pre(ctx, player);
        }
    }

    pub fn player_left(&mut self, ctx: &mut NetContext, player: PlayerId) {
        for &index in &self.lists.connection_events {
            self.entries[index].module.on_player_left(ctx, player);
        }
    }

    pub fn player_left_post(&mut self, ctx: &mut NetContext, player: PlayerId) {
        for &index in &self.lists.connection_events {
            self.entries[index].module.on_player_left_post(ctx, player);
        }
    }

    /// The promotion sequence: demote as the old role, re-enable in place
    /// as the new one (no unregister, so module state survives), then run
    /// the promote phases. `post_promote_to_server` runs only after every
    /// module has promoted, for work that needs the whole set promoted
    /// (e.g. severing now-client-invalid connections).
    pub fn promote(&mut self, ctx: &mut NetContext) {
        info!("promoting {} modules to server role", self.entries.len());
        self.migration = MigrationState::Promoting;

        for entry in &mut self.entries {
            entry.module.on_disable(ctx);
            entry.state = ModuleState::Disabled;
        }

        self.role = Role::Server;

        for entry in &mut self.entries {
            entry.module.on_enable(ctx);
            entry.state = ModuleState::Enabled;
        }

        for &index in &self.lists.promote {
            self.entries[index].module.promote_to_server(ctx);
        }
        for &index in &self.lists.promote {
            self.entries[index].module.post_promote_to_server(ctx);
        }

        self.migration = MigrationState::Idle;
    }

    /// Hands the session to a newly promoted server elsewhere.
    pub fn transfer(&mut self, ctx: &mut NetContext, new_server: PlayerId) {
        self.migration = MigrationState::Transferring;

        for &index in &self.lists.transfer {
            self.entries[index]
                .module
                .transfer_to_new_server(ctx, new_server);
        }
        for &index in &self.lists.transfer {
            self.entries[index].module.post_transfer(ctx);
        }

        self.migration = MigrationState::Idle;
    }
}
