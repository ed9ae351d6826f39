//! Coarse shape classification of received packets

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{IwpPacket, WirePoint};

/// Rough shape of the points in one packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatternKind {
    Empty,
    /// Fewer than four points
    Simple,
    /// Both a mostly-horizontal and a mostly-vertical lit segment
    Crosshair,
    /// Lit points roughly equidistant from the centroid
    LevelCircle,
    Complex,
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PatternKind::Empty => "Empty",
            PatternKind::Simple => "Simple",
            PatternKind::Crosshair => "Crosshair",
            PatternKind::LevelCircle => "Level Circle",
            PatternKind::Complex => "Complex",
        })
    }
}

/// A segment counts as horizontal when `dx > AXIS_RATIO * dy`, and the same
/// the other way round for vertical.
const AXIS_RATIO: u32 = 3;

/// Relative spread of centroid distances under which points form a circle.
const CIRCLE_TOLERANCE: f64 = 0.2;

const MIN_CIRCLE_POINTS: usize = 8;
const MIN_CIRCLE_LIT_POINTS: usize = 4;

pub fn classify_packet(packet: &IwpPacket) -> PatternKind {
    classify(&packet.points)
}

pub fn classify(points: &[WirePoint]) -> PatternKind {
    match points.len() {
        0 => return PatternKind::Empty,
        1..=3 => return PatternKind::Simple,
        _ => {}
    }

    let (mut horizontal, mut vertical) = (false, false);
    for pair in points.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if a.blanking || b.blanking {
            continue;
        }
        let dx = a.x.abs_diff(b.x) as u32;
        let dy = a.y.abs_diff(b.y) as u32;
        if dx > dy * AXIS_RATIO {
            horizontal = true;
        } else if dy > dx * AXIS_RATIO {
            vertical = true;
        }
    }

    if horizontal && vertical {
        PatternKind::Crosshair
    } else if is_circle(points) {
        PatternKind::LevelCircle
    } else {
        PatternKind::Complex
    }
}

fn is_circle(points: &[WirePoint]) -> bool {
    if points.len() < MIN_CIRCLE_POINTS {
        return false;
    }

    // Centroid over every point, blanked ones included.
    let n = points.len() as f64;
    let cx = points.iter().map(|p| p.x as f64).sum::<f64>() / n;
    let cy = points.iter().map(|p| p.y as f64).sum::<f64>() / n;

    let distances: Vec<f64> = points
        .iter()
        .filter(|p| !p.blanking)
        .map(|p| (p.x as f64 - cx).hypot(p.y as f64 - cy))
        .collect();
    if distances.len() < MIN_CIRCLE_LIT_POINTS {
        return false;
    }

    let count = distances.len() as f64;
    let mean = distances.iter().sum::<f64>() / count;
    let variance = distances.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / count;
    variance.sqrt() < mean * CIRCLE_TOLERANCE
}
