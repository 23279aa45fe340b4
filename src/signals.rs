use signal_hook::{
    consts::{SIGINT, SIGTERM},
    iterator::Signals,
};
use tokio::sync::watch;

/// Flip `shutdown` to `true` on SIGINT or SIGTERM. A second signal exits
/// immediately.
pub fn handle_shutdown(shutdown: watch::Sender<bool>) -> std::io::Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;

    std::thread::spawn(move || {
        for signal in signals.forever() {
            if *shutdown.borrow() {
                log::warn!("Received signal {signal} again, exiting now");
                std::process::exit(1);
            }
            log::warn!("Received signal {signal}, shutting down");
            let _ = sd_notify::notify(true, &[sd_notify::NotifyState::Stopping]);
            let _ = shutdown.send(true);
        }
    });

    Ok(())
}
