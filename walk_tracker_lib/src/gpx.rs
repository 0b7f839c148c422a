use std::sync::LazyLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use uuid::Uuid;

use crate::distance::{distance, track_distance};
use crate::location_point::LocationPoint;
use crate::walk_session::WalkSession;

const GPX_HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<gpx version=\"1.1\" creator=\"WalkApp\" xmlns=\"http://www.topografix.com/GPX/1/1\">";

static WAYPOINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<wpt lat="([-0-9.]+)" lon="([-0-9.]+)">([\s\S]*?)</wpt>"#).unwrap()
});

static TIME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<time>(.*?)</time>").unwrap());

/// Serializes a track to GPX text, dropping points within `precision_meters`
/// of the previously kept one. Coordinates are written with 5 decimal digits
/// (~1.1 m at the equator), so the format is intentionally lossy.
pub fn export(points: &[LocationPoint], precision_meters: f64) -> String {
    if points.is_empty() {
        return format!("{GPX_HEADER}\n</gpx>");
    }

    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

    let mut gpx = String::from(GPX_HEADER);
    for (index, point) in decimate(&sorted, precision_meters).iter().enumerate() {
        let time = point.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true);
        gpx.push_str(&format!(
            "\n    <wpt lat=\"{:.5}\" lon=\"{:.5}\">\n        <name>Step {}</name>\n        <time>{}</time>\n    </wpt>",
            point.latitude(),
            point.longitude(),
            index + 1,
            time,
        ));
    }
    gpx.push_str("\n</gpx>");

    gpx
}

/// Single forward pass: the first point is always kept, every later point only
/// if it is strictly further than `precision_meters` from the last kept one.
pub fn decimate(points: &[LocationPoint], precision_meters: f64) -> Vec<LocationPoint> {
    let mut kept: Vec<LocationPoint> = Vec::new();

    for point in points {
        if let Some(last) = kept.last() {
            if distance(last, point) <= precision_meters {
                continue;
            }
        }
        kept.push(point.clone());
    }

    kept
}

/// Whether a waypoint's timestamp came from its `<time>` element or was
/// filled in with the import-time clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSource {
    Parsed,
    Defaulted,
}

#[derive(Debug, Clone)]
pub struct ImportedPoint {
    pub point: LocationPoint,
    pub time_source: TimeSource,
}

pub fn import(text: &str) -> Option<WalkSession> {
    import_with_now(text, Utc::now())
}

/// Parses GPX text into an already-finalized session. Returns `None` when no
/// waypoint matched. The total distance is recomputed from the parsed
/// sequence, so a round-tripped session reports the decimated total rather
/// than the originally captured one.
pub fn import_with_now(text: &str, now: DateTime<Utc>) -> Option<WalkSession> {
    let points: Vec<LocationPoint> = import_points_with_now(text, now)
        .into_iter()
        .map(|imported| imported.point)
        .collect();

    let start_time = points.first()?.timestamp;
    let end_time = points.last().map(|point| point.timestamp);
    let total_distance = track_distance(&points);

    Some(WalkSession::new(
        Uuid::new_v4(),
        start_time,
        end_time,
        total_distance,
        points,
    ))
}

/// Waypoint scan behind `import`, with each point tagged by the origin of its
/// timestamp. Pattern-based on purpose: any well-formed-enough text around
/// the `<wpt>` elements is tolerated, and a waypoint with unparsable
/// coordinates is skipped without being reported.
pub fn import_points_with_now(text: &str, now: DateTime<Utc>) -> Vec<ImportedPoint> {
    let mut points = Vec::new();

    for captures in WAYPOINT_RE.captures_iter(text) {
        let Ok(lat) = captures[1].parse::<f64>() else {
            continue;
        };
        let Ok(lon) = captures[2].parse::<f64>() else {
            continue;
        };

        let parsed_time = TIME_RE
            .captures(&captures[3])
            .and_then(|time| DateTime::parse_from_rfc3339(&time[1]).ok())
            .map(|time| time.with_timezone(&Utc));

        let (timestamp, time_source) = match parsed_time {
            Some(time) => (time, TimeSource::Parsed),
            None => (now, TimeSource::Defaulted),
        };

        points.push(ImportedPoint {
            point: LocationPoint::from_coordinates(lat, lon, timestamp),
            time_source,
        });
    }

    points
}
