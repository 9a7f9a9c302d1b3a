use crate::state::AppState;
use fleet_core::EventLevel;
use fleet_world::SystemClock;
use std::sync::atomic::Ordering;
use std::time::Duration;

/// Step the session until `max_ticks`, or forever. A paused daemon keeps
/// the interval running but skips the step.
pub async fn run_tick_loop(app: AppState, max_ticks: Option<u64>) {
    let mut interval = if app.ticks_per_sec > 0.0 {
        let mut iv = tokio::time::interval(Duration::from_secs_f64(1.0 / app.ticks_per_sec));
        iv.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Burst);
        Some(iv)
    } else {
        None
    };
    let clock = SystemClock;

    loop {
        if !app.paused.load(Ordering::Relaxed) {
            let (events, done) = {
                let mut session = app.session.lock();
                let events = session.step(&clock, EventLevel::Normal);
                let done = max_ticks.is_some_and(|max| session.state.meta.tick >= max);
                (events, done)
            };

            let _ = app.event_tx.send(events);

            if done {
                tracing::info!("tick limit reached");
                break;
            }
        }

        if let Some(ref mut iv) = interval {
            iv.tick().await;
        } else {
            tokio::task::yield_now().await;
        }
    }
}
