use clap::Parser;
use rtpclock::rtp::RTP_HEADER_LEN;
use rtpclock::{
    MediaTick, PeriodicScheduler, Profile, RtpError, RtpHeaderEncoder, Rtpmap, SchedulerConfig,
    SessionConfig, SessionTimerGlue, TickResult, default_av_profile, sdp,
};
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "rtpclock",
    about = "Drive an RTP session clock from the default AV profile"
)]
struct Args {
    /// Tick period in milliseconds
    #[arg(long, default_value_t = 10)]
    period_ms: u64,

    /// Payload type number to send
    #[arg(long, short, default_value_t = 0)]
    payload: u8,

    /// Pick the payload by rtpmap instead (e.g. "PCMA/8000")
    #[arg(long, conflicts_with = "payload")]
    rtpmap: Option<String>,

    /// Number of ticks to run
    #[arg(long, short, default_value_t = 100)]
    ticks: u64,

    /// Print the profile table and exit
    #[arg(long)]
    list: bool,

    /// Print an SDP media block for the payload and exit
    #[arg(long)]
    sdp: bool,

    /// Port for the SDP m= line
    #[arg(long, default_value_t = 5004)]
    port: u16,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let profile = default_av_profile();

    if args.list {
        list(&profile);
        return Ok(());
    }

    let number = match &args.rtpmap {
        Some(rtpmap) => {
            rtpmap.parse::<Rtpmap>()?;
            profile
                .find_by_rtpmap(rtpmap)
                .ok_or_else(|| format!("no payload matching {} in {}", rtpmap, profile.name()))?
        }
        None => args.payload,
    };
    let payload = profile
        .get(number as usize)
        .ok_or(RtpError::EmptySlot(number))?;

    if args.sdp {
        print!("{}", sdp::media_description(&profile, payload.kind(), args.port, &[number]));
        return Ok(());
    }

    let encoder = RtpHeaderEncoder::with_random_ssrc(
        |header: [u8; RTP_HEADER_LEN], tick: &MediaTick| -> TickResult {
            tracing::info!(
                tick = tick.index,
                pt = tick.payload_number,
                ts = tick.rtp_timestamp,
                units = tick.media_units,
                header = %hex(&header),
                "packet"
            );
            Ok(())
        },
    );
    let glue = SessionTimerGlue::new(profile.clone(), SessionConfig::with_payload(number), encoder)?;

    let period = Duration::from_millis(args.period_ms);
    let mut scheduler =
        PeriodicScheduler::new(SchedulerConfig::with_period(period).with_tick_limit(args.ticks));
    scheduler.start(glue)?;

    println!(
        "sending {} ({}) every {} ms for {} ticks",
        number,
        payload.rtpmap(),
        args.period_ms,
        args.ticks
    );
    // The scheduler stops itself after the last tick.
    while !scheduler.wait_stopped(Duration::from_secs(1)) {}
    scheduler.stop();

    let stats = scheduler.stats();
    println!(
        "ticks: {}  lagging: {}  failed: {}  max drift: {:?}",
        stats.ticks, stats.lagging_ticks, stats.failed_ticks, stats.max_drift
    );

    match scheduler.take_error() {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

fn list(profile: &Profile) {
    println!("{}", profile.name());
    for (number, payload) in profile.iter() {
        println!("{:>4}  {:<6} {}", number, payload.kind().sdp_media(), payload.rtpmap());
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
