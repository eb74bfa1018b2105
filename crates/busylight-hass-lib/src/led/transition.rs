//! Timed per-LED colour sweep.
//!
//! A transition of duration `D` over `N` LEDs sets LED 1 immediately and each
//! following LED after a further `D / (N - 1)`, so the last LED lands at `D`.

use std::time::Duration;

use log::debug;

use super::Rgb;
use crate::device::{self, BusyLight};

/// Per-LED step of the sweep shown once at startup.
pub const STARTUP_SWEEP_STEP: Duration = Duration::from_millis(50);

/// Set the light to `rgb`, sweeping across the LEDs over `transition`.
///
/// Without a duration, or on a light with at most one LED, the whole light is
/// set in a single call.
pub async fn apply_colour(
    device: &impl BusyLight,
    rgb: Rgb,
    transition: Option<Duration>,
) -> device::Result<()> {
    let leds = device.led_count();
    match transition {
        Some(total) if leds > 1 => {
            let step = total.div_f64((leds - 1) as f64);
            debug!("Transition to {rgb} over {total:?} ({step:?} per LED)");
            sweep(device, rgb, step).await
        }
        _ => device.set_color(rgb, None),
    }
}

/// Set LEDs `1..=N` to `rgb` in order, sleeping `step` between LEDs.
pub async fn sweep(device: &impl BusyLight, rgb: Rgb, step: Duration) -> device::Result<()> {
    for led in 1..=device.led_count() {
        if led > 1 {
            tokio::time::sleep(step).await;
        }
        device.set_color(rgb, Some(led))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mock::MockLight;

    const RED: Rgb = Rgb::new(255, 0, 0);

    fn gaps(dev: &MockLight) -> Vec<Duration> {
        let writes = dev.writes.borrow();
        writes.windows(2).map(|w| w[1].at - w[0].at).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn five_leds_over_two_seconds() {
        let dev = MockLight::with_leds(5);
        let start = tokio::time::Instant::now();
        apply_colour(&dev, RED, Some(Duration::from_secs(2)))
            .await
            .unwrap();

        let writes = dev.writes.borrow().clone();
        assert_eq!(writes.len(), 5);
        let leds: Vec<_> = writes.iter().map(|w| w.led).collect();
        assert_eq!(leds, vec![Some(1), Some(2), Some(3), Some(4), Some(5)]);
        assert!(writes.iter().all(|w| w.rgb == RED));
        assert_eq!(writes[0].at, start);
        assert_eq!(gaps(&dev), vec![Duration::from_millis(500); 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn no_duration_sets_whole_light() {
        let dev = MockLight::with_leds(6);
        apply_colour(&dev, RED, None).await.unwrap();
        assert_eq!(dev.write_count(), 1);
        assert_eq!(dev.last_write().unwrap().led, None);
    }

    #[tokio::test(start_paused = true)]
    async fn single_led_is_immediate() {
        let dev = MockLight::with_leds(1);
        let start = tokio::time::Instant::now();
        apply_colour(&dev, RED, Some(Duration::from_secs(3)))
            .await
            .unwrap();
        assert_eq!(dev.write_count(), 1);
        let last = dev.last_write().unwrap();
        assert_eq!(last.led, None);
        assert_eq!(last.at, start);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_duration_sweeps_without_gaps() {
        let dev = MockLight::with_leds(6);
        apply_colour(&dev, Rgb::OFF, Some(Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(dev.write_count(), 6);
        assert!(gaps(&dev).iter().all(|g| g.is_zero()));
    }

    #[tokio::test(start_paused = true)]
    async fn startup_sweep_step() {
        let dev = MockLight::new();
        sweep(&dev, RED, STARTUP_SWEEP_STEP).await.unwrap();
        assert_eq!(dev.write_count(), 6);
        assert_eq!(gaps(&dev), vec![Duration::from_millis(50); 5]);
    }

    #[tokio::test(start_paused = true)]
    async fn write_failure_stops_sweep() {
        let dev = MockLight::with_leds(4);
        dev.fail_writes.set(true);
        let result = apply_colour(&dev, RED, Some(Duration::from_secs(1))).await;
        assert!(result.is_err());
        assert_eq!(dev.write_count(), 0);
    }
}
