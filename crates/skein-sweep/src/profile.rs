//! Mounting planes for sketched profiles along a pair of rails.

use serde::{Deserialize, Serialize};
use skein_core::{Result, SkeinError, Tolerance};
use skein_loft::{ruled_spine, RuledOptions};
use skein_math::Frame;
use skein_nurbs::BSplineCurve;

/// Where along each ruling the mounting plane's origin sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SupportPlacement {
    #[default]
    Rail1,
    Midway,
    Rail2,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportOptions {
    pub placement: SupportPlacement,
    /// Number of planes, spread uniformly along the rails.
    pub count: usize,
    pub tol: Tolerance,
}

impl Default for SupportOptions {
    fn default() -> Self {
        Self {
            placement: SupportPlacement::Rail1,
            count: 9,
            tol: Tolerance::default(),
        }
    }
}

/// Frames along the ruled spine between two rails: X along the ruling,
/// Z the averaged spine normal. Each frame's XY plane is a mounting
/// plane for a profile sketch.
pub fn profile_support_frames(
    rail1: &BSplineCurve,
    rail2: &BSplineCurve,
    opts: &SupportOptions,
) -> Result<Vec<Frame>> {
    if opts.count < 2 {
        return Err(SkeinError::Domain(
            "profile support needs at least two planes".into(),
        ));
    }
    let spine = ruled_spine(
        rail1,
        rail2,
        &RuledOptions {
            tol: opts.tol,
            ..Default::default()
        },
    )?;

    let mut frames = Vec::with_capacity(opts.count);
    for i in 0..opts.count {
        let u = i as f64 / (opts.count - 1) as f64;
        let p0 = spine.point_at(u, 0.0);
        let p1 = spine.point_at(u, 1.0);
        let x = p1 - p0;
        let n0 = spine.normal_at(u, 0.0);
        let n1 = spine.normal_at(u, 1.0);
        let z = match (n0, n1) {
            (Some(a), Some(b)) => (a + b).try_normalize().unwrap_or(a),
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => {
                return Err(SkeinError::Domain(format!(
                    "degenerate spine normal at parameter {}",
                    u
                )))
            }
        };
        let origin = match opts.placement {
            SupportPlacement::Rail1 => p0,
            SupportPlacement::Midway => 0.5 * (p0 + p1),
            SupportPlacement::Rail2 => p1,
        };
        let frame = Frame::from_xy(origin, x, z.cross(x)).ok_or_else(|| {
            SkeinError::Domain(format!("collapsed ruling at parameter {}", u))
        })?;
        frames.push(frame);
    }
    Ok(frames)
}
