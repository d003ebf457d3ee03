use std::path::PathBuf;
use std::process;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use sndcpy::adb::{self, Adb, CommandRunner, SystemRunner};
use sndcpy::audio::AudioSink;
use sndcpy::core::SessionResources;
use sndcpy::network;
use sndcpy::{log_debug, log_error, log_info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Stream audio from an Android device to the desktop")]
struct Args {
    /// Path to the capture app package
    #[arg(default_value = "sndcpy.apk")]
    apk: PathBuf,

    /// Device serial (only needed with multiple devices attached)
    serial: Option<String>,

    /// Local TCP port for the audio forward
    #[arg(short, long, default_value_t = 28200)]
    port: u16,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    sndcpy::core::DEBUG.store(args.debug, Ordering::SeqCst);

    let resources = Arc::new(SessionResources::new());

    let handler_resources = resources.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        log_info!("MAIN", "Stopping...");
        handler_resources.release();
        process::exit(0);
    }) {
        log_error!("MAIN", "Failed to install interrupt handler: {}", e);
        process::exit(1);
    }

    if let Err(e) = run(&args, &resources) {
        log_error!("MAIN", "{:#}", e);
        resources.release();
        process::exit(1);
    }
    resources.release();
}

/// The four sequential stages: environment check, app provisioning,
/// stream connection, playback loop.
fn run(args: &Args, resources: &SessionResources) -> Result<()> {
    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
    adb::check_adb(runner.as_ref())?;

    let adb = Adb::new(runner, args.serial.clone());
    adb.check_device()?;

    let report = adb::provision(&adb, &args.apk, args.port)?;
    if !report.metadata_capable {
        log_debug!("MAIN", "Track metadata disabled for this session");
    }

    log_info!("NET", "Connecting to audio stream...");
    let mut socket = network::connect(args.port)?;
    log_info!("NET", "Connected successfully");

    let sink = AudioSink::open()?;
    let mut writer = sink.writer();
    resources.register_socket(&socket);
    resources.register_sink(sink);

    log_info!("MAIN", "Streaming audio... Press Ctrl+C to stop");
    match network::pump(&mut socket, &mut writer) {
        Ok(total) => log_debug!("NET", "Transferred {} bytes", total),
        Err(e) => log_error!("NET", "Stream error: {}", e),
    }
    Ok(())
}
