use std::io::BufRead;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;

const THRESHOLD_RANGE: (f32, f32) = (0.0, 1.0);
const SIZE_RANGE: (u32, u32) = (64, 640);
const SCALE_RANGE: (f32, f32) = (0.1, 1.0);

/// Live-adjustable pipeline parameters.
///
/// Read by the loop on every tick or preprocessing step; written from the
/// control listener. Stored as atomics so no tick ever blocks on a lock.
pub struct Controls {
    threshold_bits: AtomicU32,
    size: AtomicU32,
    scale_bits: AtomicU32,
}

impl Controls {
    pub fn new(threshold: f32, size: u32, scale: f32) -> Self {
        Self {
            threshold_bits: AtomicU32::new(clamp_threshold(threshold).to_bits()),
            size: AtomicU32::new(clamp_size(size)),
            scale_bits: AtomicU32::new(clamp_scale(scale).to_bits()),
        }
    }

    /// Minimum confidence score a detection needs to be rendered
    pub fn threshold(&self) -> f32 {
        f32::from_bits(self.threshold_bits.load(Ordering::Relaxed))
    }

    /// Shortest edge of the model input, in pixels
    pub fn size(&self) -> u32 {
        self.size.load(Ordering::Relaxed)
    }

    /// Capture-to-canvas scale factor
    pub fn scale(&self) -> f32 {
        f32::from_bits(self.scale_bits.load(Ordering::Relaxed))
    }

    pub fn apply(&self, command: ControlCommand) {
        match command {
            ControlCommand::Threshold(value) => {
                let value = clamp_threshold(value);
                self.threshold_bits.store(value.to_bits(), Ordering::Relaxed);
                tracing::info!("Confidence threshold set to {:.2}", value);
            }
            ControlCommand::Size(value) => {
                let value = clamp_size(value);
                self.size.store(value, Ordering::Relaxed);
                tracing::info!("Model input size set to {}", value);
            }
            ControlCommand::Scale(value) => {
                let value = clamp_scale(value);
                self.scale_bits.store(value.to_bits(), Ordering::Relaxed);
                tracing::info!("Display scale set to {:.2}", value);
            }
        }
    }
}

fn clamp_threshold(value: f32) -> f32 {
    value.clamp(THRESHOLD_RANGE.0, THRESHOLD_RANGE.1)
}

fn clamp_size(value: u32) -> u32 {
    value.clamp(SIZE_RANGE.0, SIZE_RANGE.1)
}

fn clamp_scale(value: f32) -> f32 {
    value.clamp(SCALE_RANGE.0, SCALE_RANGE.1)
}

/// One parameter adjustment, parsed from a control line
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlCommand {
    Threshold(f32),
    Size(u32),
    Scale(f32),
}

#[derive(Debug, Error)]
pub enum ControlParseError {
    #[error("empty control line")]
    Empty,

    #[error("unknown control: {0}")]
    UnknownControl(String),

    #[error("invalid value for {control}: {value}")]
    InvalidValue { control: String, value: String },
}

impl FromStr for ControlCommand {
    type Err = ControlParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let control = parts.next().ok_or(ControlParseError::Empty)?;
        let value = parts.next().unwrap_or("");

        let invalid = || ControlParseError::InvalidValue {
            control: control.to_owned(),
            value: value.to_owned(),
        };

        match control {
            "threshold" => Ok(ControlCommand::Threshold(
                value.parse().map_err(|_| invalid())?,
            )),
            "size" => Ok(ControlCommand::Size(value.parse().map_err(|_| invalid())?)),
            "scale" => Ok(ControlCommand::Scale(value.parse().map_err(|_| invalid())?)),
            other => Err(ControlParseError::UnknownControl(other.to_owned())),
        }
    }
}

/// Apply control commands read from stdin, one per line.
///
/// Stands in for the slider surface: `threshold 0.4`, `size 192`,
/// `scale 0.75`. Malformed lines are logged and skipped.
pub fn spawn_stdin_listener(controls: Arc<Controls>) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("control-listener".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(_) => break,
                };

                if line.trim().is_empty() {
                    continue;
                }

                match line.parse::<ControlCommand>() {
                    Ok(command) => controls.apply(command),
                    Err(err) => tracing::warn!("Ignoring control line: {err}"),
                }
            }
        })
        .expect("failed to spawn control listener")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_controls() {
        assert_eq!(
            "threshold 0.4".parse::<ControlCommand>().unwrap(),
            ControlCommand::Threshold(0.4)
        );
        assert_eq!(
            "size 192".parse::<ControlCommand>().unwrap(),
            ControlCommand::Size(192)
        );
        assert_eq!(
            "scale 0.75".parse::<ControlCommand>().unwrap(),
            ControlCommand::Scale(0.75)
        );
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(matches!(
            "".parse::<ControlCommand>(),
            Err(ControlParseError::Empty)
        ));
        assert!(matches!(
            "gain 3".parse::<ControlCommand>(),
            Err(ControlParseError::UnknownControl(_))
        ));
        assert!(matches!(
            "threshold abc".parse::<ControlCommand>(),
            Err(ControlParseError::InvalidValue { .. })
        ));
        assert!(matches!(
            "size".parse::<ControlCommand>(),
            Err(ControlParseError::InvalidValue { .. })
        ));
    }

    #[test]
    fn applied_values_are_clamped() {
        let controls = Controls::new(0.25, 128, 0.5);

        controls.apply(ControlCommand::Threshold(3.0));
        controls.apply(ControlCommand::Size(16));
        controls.apply(ControlCommand::Scale(0.0));

        assert_eq!(controls.threshold(), 1.0);
        assert_eq!(controls.size(), 64);
        assert_eq!(controls.scale(), 0.1);
    }
}
