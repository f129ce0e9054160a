//! Stop-and-wait protocol tests: timeout recovery, idempotent
//! retransmission, stale-ack handling, and seeded determinism.

use std::any::Any;
use std::collections::VecDeque;
use std::ops::Range;
use std::time::Duration;

use relaysim::{
    Ack, LossyReceiver, ModuleContext, ModuleEvent, NetworkConfig, ProtocolConfig, RandomSource,
    SimError, SimRng, SimWorld, StopAndWaitSender, Unit,
};

/// Replays a fixed list of ratio draws, then settles on 0.99 (never
/// below any loss threshold in these tests). Lets a test force a loss
/// on a specific delivery attempt.
struct ScriptedRandom {
    draws: VecDeque<f64>,
}

impl ScriptedRandom {
    fn new(draws: &[f64]) -> Self {
        Self {
            draws: draws.iter().copied().collect(),
        }
    }
}

impl RandomSource for ScriptedRandom {
    fn random_ratio(&mut self) -> f64 {
        self.draws.pop_front().unwrap_or(0.99)
    }

    fn random_range_u64(&mut self, range: Range<u64>) -> u64 {
        range.start
    }
}

fn protocol(timeout: Duration, limit: u64) -> ProtocolConfig {
    ProtocolConfig {
        timeout,
        loss_probability: 0.5,
        auto_start: true,
        message_limit: Some(limit),
    }
}

/// Sender wired to a receiver whose loss draws follow `draws`.
fn scripted_world(
    config: ProtocolConfig,
    draws: &[f64],
) -> (
    SimWorld<Unit>,
    relaysim::ModuleId,
    relaysim::ModuleId,
) {
    let mut world = SimWorld::new();
    let sender = world.add_module("sender", Box::new(StopAndWaitSender::new(&config)));
    let receiver = world.add_module(
        "receiver",
        Box::new(LossyReceiver::new(
            config.loss_probability,
            ScriptedRandom::new(draws),
        )),
    );
    world.connect(sender, receiver).unwrap();
    world.connect(receiver, sender).unwrap();
    (world, sender, receiver)
}

#[test]
fn lossless_run_never_retransmits() {
    let config = ProtocolConfig {
        timeout: Duration::from_secs(1),
        loss_probability: 0.0,
        auto_start: true,
        message_limit: Some(5),
    };
    let (mut world, sender_id, receiver_id) = scripted_world(config, &[]);

    world.run_until_empty().unwrap();

    let sender = world.module::<StopAndWaitSender>(sender_id).unwrap();
    assert_eq!(sender.stats().data_sent, 5);
    assert_eq!(sender.stats().retransmits, 0);
    assert_eq!(sender.stats().acks_accepted, 5);
    assert_eq!(sender.stats().last_acked_seq, 5);
    assert_eq!(sender.outstanding_seq(), None);
    assert!(!sender.timer_armed());

    let receiver = world
        .module::<LossyReceiver<ScriptedRandom>>(receiver_id)
        .unwrap();
    assert_eq!(receiver.stats().arrivals, 5);
    assert_eq!(receiver.stats().dropped, 0);
    assert_eq!(receiver.stats().acks_sent, 5);
}

#[test]
fn loss_on_first_attempt_recovers_at_timeout() {
    // Drop the very first delivery; everything after goes through.
    let (mut world, sender_id, _) =
        scripted_world(protocol(Duration::from_secs(1), 2), &[0.0]);

    // Just before the timeout nothing has been acknowledged and no
    // retransmission has happened.
    world.run_until(Duration::from_millis(999)).unwrap();
    {
        let sender = world.module::<StopAndWaitSender>(sender_id).unwrap();
        assert_eq!(sender.stats().data_sent, 1);
        assert_eq!(sender.stats().retransmits, 0);
        assert_eq!(sender.stats().acks_accepted, 0);
        assert_eq!(sender.outstanding_seq(), Some(1));
        assert!(sender.timer_armed());
    }

    // At t=1s the timer fires, seq=1 is resent and acknowledged, and
    // the sender moves on to seq=2 within the same instant.
    world.run_until(Duration::from_secs(1)).unwrap();
    let sender = world.module::<StopAndWaitSender>(sender_id).unwrap();
    assert_eq!(sender.stats().retransmits, 1);
    assert_eq!(sender.stats().data_sent, 3);
    assert_eq!(sender.stats().acks_accepted, 2);
    assert_eq!(sender.stats().last_acked_seq, 2);
}

#[test]
fn repeated_loss_retransmits_same_seq_until_acked() {
    // Three consecutive drops of seq=1, then success.
    let (mut world, sender_id, receiver_id) =
        scripted_world(protocol(Duration::from_secs(1), 1), &[0.0, 0.0, 0.0]);

    world.initialize().unwrap();
    let mut last_acked = 0;
    while world.step().unwrap() {
        let sender = world.module::<StopAndWaitSender>(sender_id).unwrap();
        // At most one message in flight, and the timer tracks it.
        assert_eq!(sender.outstanding_seq().is_some(), sender.timer_armed());
        if let Some(seq) = sender.outstanding_seq() {
            assert_eq!(seq, 1, "retransmissions reuse the original seq");
        }
        assert!(sender.stats().last_acked_seq >= last_acked);
        last_acked = sender.stats().last_acked_seq;
    }

    let sender = world.module::<StopAndWaitSender>(sender_id).unwrap();
    assert_eq!(sender.stats().data_sent, 4);
    assert_eq!(sender.stats().retransmits, 3);
    assert_eq!(sender.stats().acks_accepted, 1);

    let receiver = world
        .module::<LossyReceiver<ScriptedRandom>>(receiver_id)
        .unwrap();
    assert_eq!(receiver.stats().arrivals, 4);
    assert_eq!(receiver.stats().dropped, 3);
    assert_eq!(receiver.stats().acks_sent, 1);

    // Delivery happened at the third timeout (t=3s); the clock then
    // runs to t=4s consuming the cancelled retransmit timer.
    assert_eq!(world.current_time(), Duration::from_secs(4));
}

/// Acknowledges every arrival twice, producing a duplicate ack the
/// sender must treat as stale.
struct DoubleAcker;

impl relaysim::SimModule<Unit> for DoubleAcker {
    fn handle_event(
        &mut self,
        ctx: &mut ModuleContext<'_, Unit>,
        event: ModuleEvent<Unit>,
    ) -> relaysim::SimResult<()> {
        match event {
            ModuleEvent::UnitArrived(Unit::Data(msg)) => {
                ctx.send(Unit::Ack(Ack { seq: msg.seq }))?;
                ctx.send(Unit::Ack(Ack { seq: msg.seq }))?;
                Ok(())
            }
            other => Err(SimError::UnexpectedEvent {
                module: ctx.me(),
                detail: format!("{other:?}"),
            }),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn duplicate_acks_are_counted_as_stale() {
    let mut world: SimWorld<Unit> = SimWorld::new();
    let config = protocol(Duration::from_secs(1), 2);
    let sender_id = world.add_module("sender", Box::new(StopAndWaitSender::new(&config)));
    let acker = world.add_module("acker", Box::new(DoubleAcker));
    world.connect(sender_id, acker).unwrap();
    world.connect(acker, sender_id).unwrap();

    world.run_until_empty().unwrap();

    let sender = world.module::<StopAndWaitSender>(sender_id).unwrap();
    assert_eq!(sender.stats().acks_accepted, 2);
    assert_eq!(sender.stats().stale_acks, 2);
    assert_eq!(sender.stats().retransmits, 0);
    assert_eq!(sender.stats().last_acked_seq, 2);
}

/// Acknowledges a sequence number the sender never produced.
struct WrongAcker;

impl relaysim::SimModule<Unit> for WrongAcker {
    fn handle_event(
        &mut self,
        ctx: &mut ModuleContext<'_, Unit>,
        event: ModuleEvent<Unit>,
    ) -> relaysim::SimResult<()> {
        if let ModuleEvent::UnitArrived(Unit::Data(msg)) = event {
            ctx.send(Unit::Ack(Ack { seq: msg.seq + 10 }))?;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn ack_for_unsent_seq_is_a_contract_violation() {
    let mut world: SimWorld<Unit> = SimWorld::new();
    let config = protocol(Duration::from_secs(1), 1);
    let sender_id = world.add_module("sender", Box::new(StopAndWaitSender::new(&config)));
    let acker = world.add_module("acker", Box::new(WrongAcker));
    world.connect(sender_id, acker).unwrap();
    world.connect(acker, sender_id).unwrap();

    let err = world.run_until_empty().unwrap_err();
    assert!(matches!(err, SimError::ContractViolation(_)), "{err}");
}

#[test]
fn data_arriving_at_the_sender_is_rejected() {
    let mut world: SimWorld<Unit> = SimWorld::new();
    let config = protocol(Duration::from_secs(1), 1);
    let sender_id = world.add_module("sender", Box::new(StopAndWaitSender::new(&config)));
    let mirror = world.add_module("mirror", Box::new(relaysim::Bouncer));
    world.connect(sender_id, mirror).unwrap();
    world.connect(mirror, sender_id).unwrap();

    // The mirror bounces the data message straight back.
    let err = world.run_until_empty().unwrap_err();
    assert!(matches!(err, SimError::UnexpectedEvent { .. }), "{err}");
}

fn lossy_run(seed: u64) -> (Duration, u64, serde_json::Value, serde_json::Value) {
    let config = ProtocolConfig {
        timeout: Duration::from_millis(200),
        loss_probability: 0.2,
        auto_start: true,
        message_limit: Some(30),
    };
    let mut world: SimWorld<Unit> =
        SimWorld::new_with_config_and_seed(NetworkConfig::lan(), seed);
    let sender_id = world.add_module("sender", Box::new(StopAndWaitSender::new(&config)));
    let receiver_id = world.add_module(
        "receiver",
        Box::new(LossyReceiver::new(
            config.loss_probability,
            SimRng::new(seed.wrapping_add(1)),
        )),
    );
    world.connect(sender_id, receiver_id).unwrap();
    world.connect(receiver_id, sender_id).unwrap();

    world.run_until_empty().unwrap();

    let sender = world.module::<StopAndWaitSender>(sender_id).unwrap();
    let receiver = world.module::<LossyReceiver<SimRng>>(receiver_id).unwrap();
    (
        world.current_time(),
        world.events_processed(),
        serde_json::to_value(sender.stats()).unwrap(),
        serde_json::to_value(receiver.stats()).unwrap(),
    )
}

#[test]
fn all_messages_eventually_delivered_under_loss() {
    let (_, _, sender_stats, receiver_stats) = lossy_run(7);

    assert_eq!(sender_stats["acks_accepted"], 30);
    assert_eq!(sender_stats["last_acked_seq"], 30);

    // Conservation: nothing is created or destroyed outside the loss
    // draw. Every send arrives, every non-dropped arrival is acked,
    // and the sender never accepts more acks than were sent.
    let data_sent = sender_stats["data_sent"].as_u64().unwrap();
    let arrivals = receiver_stats["arrivals"].as_u64().unwrap();
    let dropped = receiver_stats["dropped"].as_u64().unwrap();
    let acks_sent = receiver_stats["acks_sent"].as_u64().unwrap();
    let acks_accepted = sender_stats["acks_accepted"].as_u64().unwrap();

    assert_eq!(arrivals, data_sent);
    assert_eq!(acks_sent, arrivals - dropped);
    assert!(acks_accepted <= acks_sent);
}

#[test]
fn same_seed_reproduces_the_same_run() {
    assert_eq!(lossy_run(7), lossy_run(7));
}

#[test]
fn different_seeds_diverge() {
    assert_ne!(lossy_run(7), lossy_run(8));
}
