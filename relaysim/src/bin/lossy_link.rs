//! Runs the reliable delivery pair over a lossy link and prints a summary.
//!
//! Usage: `lossy_link [seed]` — the same seed always reproduces the same
//! run. Set `RUST_LOG`-style verbosity by editing the max level below.

use std::time::Duration;

use relaysim::{
    LossyReceiver, NetworkConfig, ProtocolConfig, SimRng, SimWorld, StopAndWaitSender, Unit,
};

fn main() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .try_init();

    let seed: u64 = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(0);

    let config = ProtocolConfig {
        timeout: Duration::from_secs(1),
        loss_probability: 0.1,
        auto_start: true,
        message_limit: Some(50),
    };

    let mut world: SimWorld<Unit> = SimWorld::new_with_config_and_seed(NetworkConfig::lan(), seed);
    let sender_id = world.add_module("sender", Box::new(StopAndWaitSender::new(&config)));
    let receiver_id = world.add_module(
        "receiver",
        Box::new(LossyReceiver::new(
            config.loss_probability,
            SimRng::new(seed.wrapping_add(1)),
        )),
    );
    world
        .connect(sender_id, receiver_id)
        .expect("sender gate wiring failed");
    world
        .connect(receiver_id, sender_id)
        .expect("receiver gate wiring failed");

    if let Err(err) = world.run_until_empty() {
        eprintln!("simulation halted: {err}");
        std::process::exit(1);
    }

    let sender = world
        .module::<StopAndWaitSender>(sender_id)
        .expect("sender state");
    let receiver = world
        .module::<LossyReceiver<SimRng>>(receiver_id)
        .expect("receiver state");

    eprintln!("seed {seed}: done in {:?}", world.current_time());
    eprintln!(
        "  sender:   {} attempts, {} retransmits, {} acked (last seq {})",
        sender.stats().data_sent,
        sender.stats().retransmits,
        sender.stats().acks_accepted,
        sender.stats().last_acked_seq,
    );
    eprintln!(
        "  receiver: {} arrivals, {} dropped, {} acks sent",
        receiver.stats().arrivals,
        receiver.stats().dropped,
        receiver.stats().acks_sent,
    );
    eprintln!("  events processed: {}", world.events_processed());
}
