use std::convert::TryFrom;
use std::env;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context};
use linux_embedded_hal::{Delay, I2cdev};
use mlx90640_acquire::{Config, FrameRate, I2cBus, Subpage, Synchronizer};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 || args.len() > 5 {
        bail!("Usage: <I2C bus> <camera address> [frame rate] [num_subpages]");
    }
    let bus_path = Path::new(&args[1]);
    let address: u8 = if let Some(hex_digits) = args[2].strip_prefix("0x") {
        u8::from_str_radix(hex_digits, 16)?
    } else {
        args[2].parse()?
    };
    let i2c = I2cdev::new(bus_path).context("unable to open the I2C bus")?;
    let mut sync = Synchronizer::new(I2cBus::new(i2c, address), Delay, Config::default())?;
    if let Some(rate) = args.get(3) {
        let frame_rate = FrameRate::try_from(rate.parse::<f32>()?)?;
        sync.set_frame_rate(frame_rate)?;
    }
    let info = sync.read_refresh_rate()?;
    let num_subpages: usize = match args.get(4) {
        Some(count) => count.parse()?,
        None => (info.full_frame_hz * 20f32) as usize,
    };
    if num_subpages < 2 {
        bail!("At least two subpages are needed to measure a rate");
    }
    let budget = sync.frame_budget()?;
    println!(
        "Starting measurements at {}Hz ({} polls of {}µs per subpage).",
        info.full_frame_hz, budget.max_retries, budget.poll_interval_us
    );

    let mut instants = Vec::with_capacity(num_subpages);
    sync.discard_stale(Subpage::Zero)?;
    let mut expected = Subpage::Zero;
    while instants.len() < num_subpages {
        let ready = sync.await_subpage(expected, &budget)?;
        instants.push(Instant::now());
        sync.capture_subpage(ready.subpage)?;
        expected = expected.other();
    }

    // Find the duration between each subpage, then calculate some statistics on those durations.
    let durations: Vec<Duration> = instants
        .windows(2)
        .map(|pair| pair[1].duration_since(pair[0]))
        .collect();
    let mut sorted_durations = durations.clone();
    sorted_durations.sort();
    println!(
        "For {}Hz ({}Hz per subpage), actual subpage rates (min, max, mean, median):",
        info.full_frame_hz,
        info.full_frame_hz * 2.0
    );
    // The longest gap is the lowest rate.
    let slowest = sorted_durations
        .last()
        .ok_or_else(|| anyhow!("no durations measured"))?;
    let fastest = sorted_durations
        .first()
        .ok_or_else(|| anyhow!("no durations measured"))?;
    println!("{:.3}", as_frequency(slowest));
    println!("{:.3}", as_frequency(fastest));
    let mean_duration = durations.iter().sum::<Duration>() / durations.len() as u32;
    println!("{:.3}", as_frequency(&mean_duration));
    let middle = sorted_durations.len() / 2;
    let median = if sorted_durations.len() % 2 == 0 {
        (sorted_durations[middle - 1] + sorted_durations[middle]) / 2
    } else {
        sorted_durations[middle]
    };
    println!("{:.3}", as_frequency(&median));
    Ok(())
}

fn as_frequency(duration: &Duration) -> f64 {
    duration.as_secs_f64().recip()
}
