#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::undocumented_unsafe_blocks)]

//! CLI demo for the twist engine: generate or load points, run the
//! kernel over them once, optionally verify against the host reference,
//! and print or write the transformed points.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{Layer, layer::SubscriberExt, util::SubscriberInitExt};
use twist_engine::{Point, TwistEngine};

#[derive(
    Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default, clap::ValueEnum,
)]
enum TracingLogLevel {
    Off,
    Trace,
    Info,
    Debug,
    Warn,
    #[default]
    Error,
}

impl From<TracingLogLevel> for tracing::Level {
    fn from(value: TracingLogLevel) -> Self {
        match value {
            //We clamp this to the lowest possible level but this shouldn't happen
            TracingLogLevel::Off => tracing::Level::TRACE,
            TracingLogLevel::Trace => tracing::Level::TRACE,
            TracingLogLevel::Info => tracing::Level::INFO,
            TracingLogLevel::Debug => tracing::Level::DEBUG,
            TracingLogLevel::Warn => tracing::Level::WARN,
            TracingLogLevel::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum CliVulkanLogLevel {
    Verbose,
    Info,
    Warning,
    Error,
}

impl From<CliVulkanLogLevel> for twist_vk::instance::VulkanLogLevel {
    fn from(value: CliVulkanLogLevel) -> Self {
        match value {
            CliVulkanLogLevel::Verbose => {
                twist_vk::instance::VulkanLogLevel::Verbose
            }
            CliVulkanLogLevel::Info => twist_vk::instance::VulkanLogLevel::Info,
            CliVulkanLogLevel::Warning => {
                twist_vk::instance::VulkanLogLevel::Warning
            }
            CliVulkanLogLevel::Error => {
                twist_vk::instance::VulkanLogLevel::Error
            }
        }
    }
}

#[derive(clap::Parser, Debug)]
struct CliArgs {
    /// Path to the compiled compute kernel (SPIR-V).
    kernel: PathBuf,

    /// Twist angle in radians per unit height.
    #[arg(short, long, default_value_t = std::f32::consts::FRAC_PI_2)]
    angle: f32,

    /// Envelope scale applied to the angle.
    #[arg(short, long, default_value_t = 1.0)]
    envelope: f32,

    /// Generate a unit helix of this many points.
    #[arg(short, long, default_value_t = 1024, conflicts_with = "input")]
    count: usize,

    /// Load points from a file instead: one `x y z [w]` tuple per line.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Write the transformed points here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Compare the GPU output against the host reference transform.
    #[arg(long)]
    verify: bool,

    #[arg(short, long, default_value = "error")]
    tracing_log_level: TracingLogLevel,

    #[arg(short, long)]
    graphics_debug_level: Option<CliVulkanLogLevel>,
}

fn main() -> eyre::Result<()> {
    let cli_args = CliArgs::parse();

    if cli_args.tracing_log_level != TracingLogLevel::Off {
        let stdout_log = tracing_subscriber::fmt::layer().pretty();
        tracing_subscriber::registry()
            .with(stdout_log.with_filter(
                tracing_subscriber::filter::LevelFilter::from_level(
                    cli_args.tracing_log_level.into(),
                ),
            ))
            .init();
    }

    let points = match &cli_args.input {
        Some(path) => parse_points(&fs::read_to_string(path)?)
            .map_err(|e| eyre::eyre!("{}: {e}", path.display()))?,
        None => helix(cli_args.count),
    };
    tracing::info!("Twisting {} points", points.len());

    let engine = TwistEngine::new(
        "twist-app",
        cli_args.graphics_debug_level.map(Into::into),
    )?;
    let twisted = engine.twist_points(
        &cli_args.kernel,
        &points,
        cli_args.angle,
        cli_args.envelope,
    )?;

    if cli_args.verify {
        verify(&points, &twisted, cli_args.angle, cli_args.envelope)?;
        tracing::info!("GPU output matches the host reference");
    }

    let mut rendered = String::with_capacity(twisted.len() * 32);
    for p in &twisted {
        rendered.push_str(&format!("{} {} {} {}\n", p.x, p.y, p.z, p.w));
    }
    match &cli_args.output {
        Some(path) => fs::write(path, rendered)?,
        None => print!("{rendered}"),
    }

    Ok(())
}

/// A unit-radius helix climbing the Y axis, one point per tenth of a
/// radian. Gives the twist something visibly non-degenerate to act on.
fn helix(count: usize) -> Vec<Point> {
    (0..count)
        .map(|i| {
            let t = i as f32 * 0.1;
            Point::new(t.cos(), t, t.sin(), 1.0)
        })
        .collect()
}

fn parse_points(text: &str) -> eyre::Result<Vec<Point>> {
    let mut points = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<f32> = line
            .split_whitespace()
            .map(|f| {
                f.parse::<f32>()
                    .map_err(|e| eyre::eyre!("line {}: {e}", line_no + 1))
            })
            .collect::<Result<_, _>>()?;
        let point = match fields[..] {
            [x, y, z] => Point::new(x, y, z, 1.0),
            [x, y, z, w] => Point::new(x, y, z, w),
            _ => {
                return Err(eyre::eyre!(
                    "line {}: expected 3 or 4 fields, found {}",
                    line_no + 1,
                    fields.len()
                ));
            }
        };
        points.push(point);
    }
    Ok(points)
}

const VERIFY_TOLERANCE: f32 = 1e-4;

fn verify(
    inputs: &[Point],
    outputs: &[Point],
    angle: f32,
    envelope: f32,
) -> eyre::Result<()> {
    if inputs.len() != outputs.len() {
        return Err(eyre::eyre!(
            "output count {} does not match input count {}",
            outputs.len(),
            inputs.len()
        ));
    }
    for (i, (input, got)) in inputs.iter().zip(outputs).enumerate() {
        let want = input.twisted(angle, envelope);
        let off = (got.x - want.x).abs().max(
            (got.y - want.y)
                .abs()
                .max((got.z - want.z).abs().max((got.w - want.w).abs())),
        );
        if off > VERIFY_TOLERANCE {
            return Err(eyre::eyre!(
                "point {i} deviates by {off}: got {got:?}, want {want:?}"
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helix_generates_requested_count() {
        assert_eq!(helix(0).len(), 0);
        assert_eq!(helix(17).len(), 17);
        // Unit radius in the XZ plane.
        for p in helix(50) {
            assert!((p.x * p.x + p.z * p.z - 1.0).abs() < 1e-5);
            assert_eq!(p.w, 1.0);
        }
    }

    #[test]
    fn parse_points_accepts_three_or_four_fields() {
        let points =
            parse_points("1 2 3\n4 5 6 0.5\n\n# comment\n 7 8 9 \n").unwrap();
        assert_eq!(
            points,
            vec![
                Point::new(1.0, 2.0, 3.0, 1.0),
                Point::new(4.0, 5.0, 6.0, 0.5),
                Point::new(7.0, 8.0, 9.0, 1.0),
            ]
        );
    }

    #[test]
    fn parse_points_rejects_bad_lines() {
        assert!(parse_points("1 2").is_err());
        assert!(parse_points("1 2 3 4 5").is_err());
        assert!(parse_points("1 2 x").is_err());
    }

    #[test]
    fn verify_flags_deviations() {
        let inputs = [Point::new(1.0, 1.0, 0.0, 1.0)];
        let good = [inputs[0].twisted(0.5, 1.0)];
        assert!(verify(&inputs, &good, 0.5, 1.0).is_ok());

        let bad = [Point::new(0.0, 0.0, 0.0, 0.0)];
        assert!(verify(&inputs, &bad, 0.5, 1.0).is_err());
        assert!(verify(&inputs, &[], 0.5, 1.0).is_err());
    }
}
