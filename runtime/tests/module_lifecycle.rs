//! Orchestrator ordering guarantees: registration order within a list,
//! fixed global phase order per tick, and the promotion sequence.

use std::{cell::RefCell, rc::Rc};

use rooknet::{Capabilities, NetContext, NetModule, PlayerId, Runtime, RuntimeConfig};

type Log = Rc<RefCell<Vec<String>>>;

struct Recorder {
    name: &'static str,
    log: Log,
}

impl Recorder {
    fn boxed(name: &'static str, log: &Log) -> Box<Recorder> {
        Box::new(Recorder {
            name,
            log: Rc::clone(log),
        })
    }

    fn record(&self, phase: &str) {
        self.log.borrow_mut().push(format!("{}.{}", self.name, phase));
    }
}

impl NetModule for Recorder {
    fn name(&self) -> &'static str {
        self.name
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
            .with_fixed_update()
            .with_batch()
            .with_update()
            .with_promote()
    }

    fn on_enable(&mut self, _ctx: &mut NetContext) {
        self.record("enable");
    }

    fn on_disable(&mut self, _ctx: &mut NetContext) {
        self.record("disable");
    }

    fn update(&mut self, _ctx: &mut NetContext, _delta_seconds: f32) {
        self.record("update");
    }

    fn pre_fixed_update(&mut self, _ctx: &mut NetContext) {
        self.record("pre_fixed");
    }

    fn fixed_update(&mut self, _ctx: &mut NetContext) {
        self.record("fixed");
    }

    fn post_fixed_update(&mut self, _ctx: &mut NetContext) {
        self.record("post_fixed");
    }

    fn batch(&mut self, _ctx: &mut NetContext) {
        self.record("batch");
    }

    fn post_batch(&mut self, _ctx: &mut NetContext) {
        self.record("post_batch");
    }

    fn promote_to_server(&mut self, _ctx: &mut NetContext) {
        self.record("promote");
    }

    fn post_promote_to_server(&mut self, _ctx: &mut NetContext) {
        self.record("post_promote");
    }
}

fn runtime_with_recorders() -> (Runtime, Log) {
    let (transport, _pair) = rooknet::LoopbackTransport::new();
    let mut runtime = Runtime::new_client(RuntimeConfig::default(), Box::new(transport));
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    runtime.register_module(Recorder::boxed("a", &log));
    runtime.register_module(Recorder::boxed("b", &log));
    log.borrow_mut().clear();
    (runtime, log)
}

#[test]
fn tick_runs_phases_in_global_order() {
    let (mut runtime, log) = runtime_with_recorders();

    runtime.tick();

    assert_eq!(
        *log.borrow(),
        vec![
            "a.pre_fixed",
            "b.pre_fixed",
            "a.fixed",
            "b.fixed",
            "a.post_fixed",
            "b.post_fixed",
            "a.batch",
            "b.batch",
            "a.post_batch",
            "b.post_batch",
        ]
    );
}

#[test]
fn frame_runs_update_in_registration_order() {
    let (mut runtime, log) = runtime_with_recorders();

    runtime.frame(0.016);

    assert_eq!(*log.borrow(), vec!["a.update", "b.update"]);
}

#[test]
fn promotion_migrates_modules_in_place() {
    let (mut runtime, log) = runtime_with_recorders();

    runtime.promote_to_server();

    // demote as the old role, re-enable in place, then the promote phases;
    // post-promote only after every module has promoted
    assert_eq!(
        *log.borrow(),
        vec![
            "a.disable",
            "b.disable",
            "a.enable",
            "b.enable",
            "a.promote",
            "b.promote",
            "a.post_promote",
            "b.post_promote",
        ]
    );
    assert!(runtime.is_server());
}

#[test]
fn modules_survive_promotion_with_state() {
    struct Counter {
        ticks: Rc<RefCell<u32>>,
    }

    impl NetModule for Counter {
        fn name(&self) -> &'static str {
            "counter"
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::NONE.with_fixed_update()
        }

        fn fixed_update(&mut self, _ctx: &mut NetContext) {
            *self.ticks.borrow_mut() += 1;
        }
    }

    let (transport, _pair) = rooknet::LoopbackTransport::new();
    let mut runtime = Runtime::new_client(RuntimeConfig::default(), Box::new(transport));
    let ticks = Rc::new(RefCell::new(0));
    runtime.register_module(Box::new(Counter {
        ticks: Rc::clone(&ticks),
    }));

    runtime.tick();
    runtime.promote_to_server();
    runtime.tick();

    // the same module instance kept counting across the role swap
    assert_eq!(*ticks.borrow(), 2);
}

#[test]
fn transfer_phases_run_for_transfer_modules() {
    struct TransferRecorder {
        log: Log,
    }

    impl NetModule for TransferRecorder {
        fn name(&self) -> &'static str {
            "transfer-recorder"
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::NONE.with_transfer()
        }

        fn transfer_to_new_server(&mut self, _ctx: &mut NetContext, new_server: PlayerId) {
            self.log
                .borrow_mut()
                .push(format!("transfer:{}", new_server.value()));
        }

        fn post_transfer(&mut self, _ctx: &mut NetContext) {
            self.log.borrow_mut().push("post_transfer".to_string());
        }
    }

    let (transport, _pair) = rooknet::LoopbackTransport::new();
    let mut runtime = Runtime::new_client(RuntimeConfig::default(), Box::new(transport));
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    runtime.register_module(Box::new(TransferRecorder {
        log: Rc::clone(&log),
    }));

    runtime.transfer_to_new_server(PlayerId::new(4));

    assert_eq!(*log.borrow(), vec!["transfer:4", "post_transfer"]);
}
