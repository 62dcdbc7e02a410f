//! rtform demo: two headless peers editing one form over the in-process
//! relay.
//!
//! Run with `RUST_LOG=debug` to watch the lifecycle callbacks fire.

mod peer;

use log::info;
use peer::{DemoPeer, Field};
use rtform_collab::{Relay, RelayConfig, RelayError, RelayResult};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();

    if let Err(e) = run().await {
        log::error!("demo failed: {e}");
        std::process::exit(1);
    }
}

async fn run() -> RelayResult<()> {
    let relay = Relay::new(RelayConfig::default());

    info!("Starting first peer...");
    let mut alice = DemoPeer::new("alice", &relay, None)?;
    alice.connect().await?;
    let token = alice
        .session
        .share_token()
        .ok_or(RelayError::NotConnected)?;
    info!("share token: {token}");

    let mut bob = DemoPeer::new("bob", &relay, Some(&token))?;
    bob.connect().await?;

    alice.type_into(Field::Name, "Ada").await?;
    alice.type_into(Field::Comments, "world").await?;
    settle(&mut alice, &mut bob).await?;

    // Bob is mid-word while Alice prepends text to the same field.
    bob.place_caret(Field::Comments, 3);
    alice.type_into(Field::Comments, "hello world").await?;
    bob.toggle_subscribe(true).await?;
    settle(&mut alice, &mut bob).await?;

    for peer in [&alice, &bob] {
        info!("{}", peer.describe());
    }
    let converged = alice.session.snapshot()? == bob.session.snapshot()?;
    info!("converged: {converged}");

    relay.close_channel(alice.client.channel(), "demo finished").await?;
    alice.client.run(&mut alice.session).await?;
    bob.client.run(&mut bob.session).await?;
    if let Some(notice) = bob.session.abort_notice() {
        info!("bob sees: {notice}");
    }
    Ok(())
}

/// Pump both peers until neither has anything left to handle.
async fn settle(alice: &mut DemoPeer, bob: &mut DemoPeer) -> RelayResult<()> {
    loop {
        let handled = alice.sync().await? + bob.sync().await?;
        if handled == 0 && !alice.client.has_pending() && !bob.client.has_pending() {
            return Ok(());
        }
        if handled == 0 {
            // Something is pending but nothing arrived: push it out.
            alice.client.flush().await?;
            bob.client.flush().await?;
        }
    }
}
