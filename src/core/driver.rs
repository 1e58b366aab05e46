//! Host event loop
//!
//! Multiplexes the clock tick, the presence poll cadence and host events
//! into one `ExamSession`. Runs until the session is submitted or has
//! failed with no retry left.
//!
//! A presence poll runs as its own branch next to the timers: inference in
//! flight never holds up a tick or a host event. At most one poll is in
//! flight; cadence ticks that land while one is pending are skipped. A
//! reading that completes after the session left ACTIVE is discarded by the
//! session.

use futures_util::future::{BoxFuture, FutureExt};
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::ExamConfig;
use crate::core::presence::{poll_presence, PresenceReading, PresenceSignalSource};
use crate::core::session::ExamSession;
use crate::core::transport::ExamTransport;
use crate::core::viewport::ViewportHost;
use crate::types::{OptionLabel, QuestionId, SessionOutput, SessionState};

/// Irregular events coming from the host UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    Answer { question: QuestionId, option: OptionLabel },
    ViewportLost,
    ViewportRestored,
    Submit,
    Retry,
}

/// Apply one host event to the session
pub fn apply_event(
    session: &mut ExamSession,
    event: HostEvent,
    viewport: &mut dyn ViewportHost,
) -> SessionOutput {
    match event {
        HostEvent::Answer { question, option } => session.set_answer(question, option),
        HostEvent::ViewportLost => session.viewport_lost(viewport),
        HostEvent::ViewportRestored => session.viewport_restored(),
        HostEvent::Submit => session.request_submit(),
        HostEvent::Retry => session.retry(),
    }
}

/// Run the session to completion.
///
/// Starts the session if it is still awaiting start. Every output is passed
/// to `on_output`; the last one is returned.
pub async fn drive<P, T, F>(
    session: &mut ExamSession,
    presence: &mut P,
    viewport: &mut dyn ViewportHost,
    transport: &T,
    mut events: mpsc::Receiver<HostEvent>,
    config: &ExamConfig,
    mut on_output: F,
) -> SessionOutput
where
    P: PresenceSignalSource + ?Sized,
    T: ExamTransport + ?Sized,
    F: FnMut(&SessionOutput),
{
    let mut last = if session.state() == SessionState::AwaitingStart {
        session.start(viewport)
    } else {
        session.status()
    };
    on_output(&last);

    let mut clock = time::interval_at(Instant::now() + config.tick_interval(), config.tick_interval());
    let mut presence_timer = time::interval_at(
        Instant::now() + config.presence_interval(),
        config.presence_interval(),
    );
    presence_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut events_open = true;

    // the source is lent to the in-flight poll and handed back with its reading
    let mut idle_source: Option<&mut P> = Some(presence);
    let mut in_flight: Option<BoxFuture<'_, (&mut P, PresenceReading)>> = None;

    loop {
        match session.state() {
            SessionState::AwaitingStart => {
                last = session.start(viewport);
                on_output(&last);
            }

            SessionState::Active => {
                tokio::select! {
                    _ = clock.tick() => {
                        last = session.tick();
                    }
                    _ = presence_timer.tick() => {
                        match idle_source.take() {
                            Some(source) => in_flight = Some(start_poll(source)),
                            None => debug!("presence poll still in flight, cycle skipped"),
                        }
                        continue;
                    }
                    (source, reading) = poll_in_flight(&mut in_flight), if in_flight.is_some() => {
                        in_flight = None;
                        idle_source = Some(source);
                        last = session.observe_presence(reading);
                    }
                    event = events.recv(), if events_open => match event {
                        Some(event) => {
                            debug!(?event, "host event");
                            last = apply_event(session, event, viewport);
                        }
                        None => {
                            debug!("host event channel closed");
                            events_open = false;
                            continue;
                        }
                    },
                }
                on_output(&last);
            }

            SessionState::Submitting => {
                last = session.deliver(transport).await;
                on_output(&last);
            }

            SessionState::Submitted => {
                info!(attempts = session.submit_attempts(), "session complete");
                return last;
            }

            SessionState::Failed => {
                if !session.can_retry() {
                    return last;
                }
                if session.submit_attempts() >= config.max_submit_attempts {
                    warn!(attempts = session.submit_attempts(), "submit attempts exhausted");
                    return last;
                }

                let backoff = time::sleep(config.retry_backoff());
                tokio::pin!(backoff);
                loop {
                    tokio::select! {
                        _ = &mut backoff => break,
                        event = events.recv(), if events_open => match event {
                            Some(HostEvent::Retry) => break,
                            Some(event) => {
                                let out = apply_event(session, event, viewport);
                                on_output(&out);
                            }
                            None => events_open = false,
                        },
                    }
                }

                last = session.retry();
                on_output(&last);
            }
        }
    }
}

/// Run one readiness check and inference, lending the source to the future
fn start_poll<'a, P>(source: &'a mut P) -> BoxFuture<'a, (&'a mut P, PresenceReading)>
where
    P: PresenceSignalSource + ?Sized,
{
    async move {
        let reading = poll_presence(&mut *source).await;
        (source, reading)
    }
    .boxed()
}

/// Await the pending poll; never resolves when none is pending
async fn poll_in_flight<'a, P>(
    in_flight: &mut Option<BoxFuture<'a, (&'a mut P, PresenceReading)>>,
) -> (&'a mut P, PresenceReading)
where
    P: ?Sized,
{
    match in_flight.as_mut() {
        Some(poll) => poll.await,
        None => std::future::pending().await,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::demo_paper;
    use crate::core::viewport::RecordingViewport;
    use crate::types::ReasonCode;

    #[test]
    fn test_apply_event_routes() {
        let mut session = ExamSession::from_start(demo_paper("Asha", "R-1"), &ExamConfig::default()).unwrap();
        let mut host = RecordingViewport::new();
        session.start(&mut host);

        let out = apply_event(
            &mut session,
            HostEvent::Answer { question: 1, option: OptionLabel::C },
            &mut host,
        );
        assert_eq!(out.reason, ReasonCode::R106_ANSWER_RECORDED);
        assert_eq!(
            apply_event(&mut session, HostEvent::ViewportLost, &mut host).reason,
            ReasonCode::R205_VIEWPORT_LOST
        );
        assert_eq!(
            apply_event(&mut session, HostEvent::ViewportRestored, &mut host).reason,
            ReasonCode::R207_VIEWPORT_RESTORED
        );
        assert_eq!(
            apply_event(&mut session, HostEvent::Retry, &mut host).reason,
            ReasonCode::R307_RETRY_UNAVAILABLE
        );
        assert_eq!(
            apply_event(&mut session, HostEvent::Submit, &mut host).reason,
            ReasonCode::R301_SUBMIT_STARTED
        );
    }
}
