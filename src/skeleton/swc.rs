//! Reading and writing SWC tables held in memory.
//!
//! A row is `id type x y z radius parent`, whitespace separated. Lines
//! starting with `#` and blank lines are ignored. Integer columns may be
//! written in float notation (`1.0`), which is common for tables written by
//! numeric tools.

use std::fmt::Write as _;

use super::SkeletonPoint;
use crate::error::SwcError;
use crate::math::Point3;

/// Parses SWC text into points, preserving row order.
///
/// # Errors
///
/// Returns [`SwcError::ColumnCount`] for rows without exactly 7 columns and
/// [`SwcError::BadNumber`] for columns that are not numbers.
pub fn parse(text: &str) -> Result<Vec<SkeletonPoint>, SwcError> {
    let mut points = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let line = i + 1;
        let row = raw.trim();
        if row.is_empty() || row.starts_with('#') {
            continue;
        }

        let cols: Vec<&str> = row.split_whitespace().collect();
        if cols.len() != 7 {
            return Err(SwcError::ColumnCount {
                line,
                found: cols.len(),
            });
        }

        let id = parse_int(cols[0], line, "id")?;
        let kind = parse_int(cols[1], line, "type")?;
        let x = parse_float(cols[2], line, "x")?;
        let y = parse_float(cols[3], line, "y")?;
        let z = parse_float(cols[4], line, "z")?;
        let radius = parse_float(cols[5], line, "radius")?;
        let parent = parse_int(cols[6], line, "parent")?;

        let kind = i32::try_from(kind).map_err(|_| SwcError::BadNumber {
            line,
            column: "type",
            text: cols[1].to_owned(),
        })?;

        points.push(SkeletonPoint::new(
            id,
            kind,
            Point3::new(x, y, z),
            radius,
            (parent >= 0).then_some(parent),
        ));
    }
    Ok(points)
}

/// Formats points as SWC text, one row per point. Roots get parent `-1`.
#[must_use]
pub fn to_string(points: &[SkeletonPoint]) -> String {
    let mut out = String::with_capacity(points.len() * 48);
    for p in points {
        let _ = writeln!(
            out,
            "{} {} {} {} {} {} {}",
            p.id,
            p.kind,
            p.position.x,
            p.position.y,
            p.position.z,
            p.radius,
            p.parent.unwrap_or(-1)
        );
    }
    out
}

fn parse_float(text: &str, line: usize, column: &'static str) -> Result<f64, SwcError> {
    text.parse::<f64>().map_err(|_| SwcError::BadNumber {
        line,
        column,
        text: text.to_owned(),
    })
}

fn parse_int(text: &str, line: usize, column: &'static str) -> Result<i64, SwcError> {
    if let Ok(v) = text.parse::<i64>() {
        return Ok(v);
    }
    let bad = || SwcError::BadNumber {
        line,
        column,
        text: text.to_owned(),
    };
    let v = parse_float(text, line, column)?;
    if v.fract() != 0.0 || !v.is_finite() || v.abs() > 9.0e15 {
        return Err(bad());
    }
    #[allow(clippy::cast_possible_truncation)]
    let v = v as i64;
    Ok(v)
}
