//! Protocol-thread wiring: start-up sequence and the steady-state loop.
//!
//! ```text
//! bootstrap:  open_downchannel ─▶ poll until DownchannelReady ─▶ prompt upload
//! loop:       process_requests ─▶ poll ─▶ drain_events ─▶ sleep poll_interval
//! ```
//!
//! Both run on the protocol execution context and use `async-io-mini`
//! timers for pacing, so the thread sleeps between polls instead of
//! spinning.

use core::time::Duration;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use async_io_mini::Timer;
use log::info;

use crate::app::ports::{AudioSink, BoxedAudioSource, CredentialRefresher, EventSink};
use crate::avs::shared::SyncFlag;
use crate::avs::stream::{StreamRole, StreamStatus};
use crate::avs::transport::{Connection, ConnectionState};
use crate::avs::Session;
use crate::error::Error;

/// Device start-up: authorize, open the downchannel, wait for it to be
/// ready, then upload `prompt` if one is given.
pub async fn bootstrap<A, C, R, E>(
    session: &mut Session<A>,
    conn: &mut C,
    refresher: &mut R,
    events: &mut E,
    prompt: Option<BoxedAudioSource>,
) -> Result<()>
where
    A: AudioSink,
    C: Connection,
    R: CredentialRefresher,
    E: EventSink,
{
    session
        .open_downchannel(conn, refresher)
        .await
        .context("opening downchannel")?;
    session.drain_events(events);

    let config = session.config();
    let ready_timeout = Duration::from_millis(u64::from(config.downchannel_ready_timeout_ms));
    let pace = Duration::from_millis(u64::from(config.poll_interval_ms));
    let deadline = Instant::now() + ready_timeout;

    while !session.is_set(SyncFlag::DownchannelReady) {
        let state = conn.poll(session).context("polling connection")?;
        session.drain_events(events);

        if session.stream_status(StreamRole::Downchannel) == Some(StreamStatus::Unauthorized) {
            return Err(Error::AuthorizationRejected).context("downchannel rejected");
        }
        if state == ConnectionState::Closed {
            bail!("connection closed before the downchannel was ready");
        }
        if Instant::now() >= deadline {
            bail!(
                "downchannel not ready after {} ms",
                ready_timeout.as_millis()
            );
        }
        Timer::after(pace).await;
    }
    info!("runtime: downchannel ready");

    if let Some(source) = prompt {
        session
            .send_speech_event(conn, source)
            .context("sending start-up speech event")?;
        session.drain_events(events);
    }
    Ok(())
}

/// Steady state.  Returns when the connection reports closed.
pub async fn run_protocol_loop<A, C, E>(
    session: &mut Session<A>,
    conn: &mut C,
    events: &mut E,
) -> Result<()>
where
    A: AudioSink,
    C: Connection,
    E: EventSink,
{
    let pace = Duration::from_millis(u64::from(session.config().poll_interval_ms));
    info!("runtime: protocol loop started");

    loop {
        session.process_requests(conn);
        let state = conn.poll(session).context("polling connection")?;
        session.drain_events(events);

        if state == ConnectionState::Closed {
            info!("runtime: connection closed, protocol loop exiting");
            return Ok(());
        }
        Timer::after(pace).await;
    }
}
