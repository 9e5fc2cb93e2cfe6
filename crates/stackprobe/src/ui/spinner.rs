//! A progress spinner drawn on stderr while a model call is in flight.
//!
//! The spinner runs as its own tokio task and is stopped through a
//! [`CancellationToken`]; [`Spinner::stop`] waits for the task to clear the
//! line before returning, so output printed afterwards is never
//! interleaved with a half-drawn frame.

use std::future::Future;
use std::io::Write;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const TICK: Duration = Duration::from_millis(80);

pub struct Spinner {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Spinner {
    /// Start drawing `message` with a spinner. Must be called inside a tokio
    /// runtime.
    pub fn start(message: impl Into<String>) -> Self {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let message = message.into();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK);
            let mut tick = 0usize;
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => {
                        draw(&format!("\r{} {message}", FRAMES[tick % FRAMES.len()]));
                        tick += 1;
                    }
                }
            }
            // Erase the whole line.
            draw("\r\x1b[2K");
        });
        Self { token, handle }
    }

    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            debug!("Spinner task ended abnormally: {e}");
        }
    }
}

fn draw(text: &str) {
    let mut stderr = std::io::stderr().lock();
    let _ = stderr.write_all(text.as_bytes());
    let _ = stderr.flush();
}

/// Await `future`, showing a spinner with `message` meanwhile when
/// `enabled`.
pub async fn with_progress<F: Future>(enabled: bool, message: &str, future: F) -> F::Output {
    if !enabled {
        return future.await;
    }
    let spinner = Spinner::start(message);
    let output = future.await;
    spinner.stop().await;
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stop_joins_the_drawing_task() {
        let spinner = Spinner::start("working");
        tokio::time::sleep(Duration::from_millis(20)).await;
        let token = spinner.token.clone();
        spinner.stop().await;
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn with_progress_returns_the_output() {
        assert_eq!(with_progress(false, "x", async { 7 }).await, 7);
        assert_eq!(with_progress(true, "x", async { 8 }).await, 8);
    }
}
