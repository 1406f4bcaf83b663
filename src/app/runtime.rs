use super::{ControlCommand, MotionRecorder, RecorderStats, ShutdownReason};
use crate::config::SessionConfig;
use crate::error::{MotionvidError, Result};
use crate::pipeline::CapturePipeline;
use crossbeam::channel::Sender;
use tracing::{info, warn};

/// Run the control loop on a blocking thread and wait for it to finish
pub async fn run_recorder<P>(mut recorder: MotionRecorder<P>) -> Result<(ShutdownReason, RecorderStats)>
where
    P: CapturePipeline + 'static,
{
    tokio::task::spawn_blocking(move || {
        let reason = recorder.run()?;
        Ok((reason, recorder.stats()))
    })
    .await
    .map_err(|e| MotionvidError::system(format!("Control loop task failed: {}", e)))?
}

/// Route process signals into the control channel.
///
/// SIGINT and SIGTERM always request a graceful stop. With `session.signal`
/// enabled SIGUSR1 is a manual trigger and SIGUSR2 a graceful stop.
pub fn spawn_signal_handlers(session: &SessionConfig, control: Sender<ControlCommand>) {
    let control_sigint = control.clone();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            info!("Received SIGINT signal (Ctrl+C)");
            if control_sigint.send(ControlCommand::Stop).is_err() {
                break;
            }
        }
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::SignalKind;

        forward_signal(SignalKind::terminate(), "SIGTERM", ControlCommand::Stop, control.clone());

        if session.signal {
            forward_signal(
                SignalKind::user_defined1(),
                "SIGUSR1",
                ControlCommand::ManualTrigger,
                control.clone(),
            );
            forward_signal(
                SignalKind::user_defined2(),
                "SIGUSR2",
                ControlCommand::Stop,
                control,
            );
        }
    }

    #[cfg(not(unix))]
    {
        drop(control);
        if session.signal {
            warn!("User signals are only supported on Unix platforms");
        }
    }
}

#[cfg(unix)]
fn forward_signal(
    kind: tokio::signal::unix::SignalKind,
    name: &'static str,
    command: ControlCommand,
    control: Sender<ControlCommand>,
) {
    tokio::spawn(async move {
        let mut stream = match tokio::signal::unix::signal(kind) {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Failed to register {} handler: {}", name, e);
                return;
            }
        };

        while stream.recv().await.is_some() {
            info!("Received {} signal", name);
            if control.send(command).is_err() {
                break;
            }
        }
    });
}
