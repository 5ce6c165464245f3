use crate::core::orbit_interp::OrbitTimeline;
use crate::types::{LosError, LosResult, StateVector};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Number of header values preceding the state vector count
const HEADER_VALUES: usize = 3;

/// Columns per state vector row: t, x, y, z, vx, vy, vz, ax, ay, az
const ROW_FIELDS: usize = 10;

const FIELD_NAMES: [&str; ROW_FIELDS] = ["t", "x", "y", "z", "vx", "vy", "vz", "ax", "ay", "az"];

/// Inclusive UTC interval used to cut a precise orbit file down to the
/// state vectors around one acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrbitWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl OrbitWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> LosResult<Self> {
        if end < start {
            return Err(LosError::InvalidInput(format!(
                "Orbit window ends ({}) before it starts ({})",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    /// `center - half_width ..= center + half_width`
    pub fn around(center: DateTime<Utc>, half_width: Duration) -> Self {
        let half_width = if half_width < Duration::zero() {
            -half_width
        } else {
            half_width
        };
        Self {
            start: center - half_width,
            end: center + half_width,
        }
    }

    pub fn contains(&self, time: &DateTime<Utc>) -> bool {
        self.start <= *time && *time <= self.end
    }
}

/// Parse an EOF timestamp such as `UTC=2020-01-03T17:00:00.000000`
pub fn parse_utc(value: &str) -> LosResult<DateTime<Utc>> {
    let stamp = value.trim();
    let stamp = stamp.strip_prefix("UTC=").unwrap_or(stamp);
    NaiveDateTime::parse_from_str(stamp, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
        .map_err(|e| LosError::InvalidFormat(format!("Invalid UTC time '{}': {}", value, e)))
}

// Earth Explorer orbit file layout; everything else in the document is skipped

#[derive(Debug, Deserialize)]
struct EarthExplorerFile {
    #[serde(rename = "Data_Block")]
    data_block: DataBlock,
}

#[derive(Debug, Deserialize)]
struct DataBlock {
    #[serde(rename = "List_of_OSVs")]
    osv_list: OsvList,
}

#[derive(Debug, Deserialize)]
struct OsvList {
    #[serde(rename = "OSV", default)]
    osvs: Vec<Osv>,
}

#[derive(Debug, Deserialize)]
struct Osv {
    #[serde(rename = "UTC")]
    utc: String,
    #[serde(rename = "X")]
    x: Measured,
    #[serde(rename = "Y")]
    y: Measured,
    #[serde(rename = "Z")]
    z: Measured,
    #[serde(rename = "VX")]
    vx: Measured,
    #[serde(rename = "VY")]
    vy: Measured,
    #[serde(rename = "VZ")]
    vz: Measured,
}

/// Element text with its `unit` attribute ignored
#[derive(Debug, Deserialize)]
struct Measured {
    #[serde(rename = "$text")]
    value: f64,
}

/// Reader for orbit timing (`.orbtiming`) files and Sentinel-1 precise or
/// restituted orbit (`.EOF`) files.
///
/// ```text
/// 0
/// 0
/// 0
/// 3992
/// 46472.0 -776354.893210 -5764729.554489 4020703.265768 -2269.808392 -3946.433388 -6078.542538 0.0 0.0 0.0
/// ...
/// ```
pub struct OrbitReader;

impl OrbitReader {
    /// Read an orbit timing file into a validated timeline
    pub fn read_orbtiming_file<P: AsRef<Path>>(path: P) -> LosResult<OrbitTimeline> {
        log::info!("Reading orbit timing file: {}", path.as_ref().display());

        let content = fs::read_to_string(&path)?;
        let timeline = Self::parse_orbtiming(&content)?;
        timeline.validate_physical();

        Ok(timeline)
    }

    /// Read either orbit format, telling them apart by content.
    ///
    /// `window` only applies to EOF files; orbit timing times carry no date.
    pub fn read_orbit_file<P: AsRef<Path>>(path: P, window: Option<&OrbitWindow>) -> LosResult<OrbitTimeline> {
        let content = fs::read_to_string(&path)?;
        let timeline = if content.trim_start().starts_with('<') {
            log::info!("Reading EOF orbit file: {}", path.as_ref().display());
            Self::parse_eof(&content, window)?
        } else {
            log::info!("Reading orbit timing file: {}", path.as_ref().display());
            if window.is_some() {
                log::warn!("Orbit window ignored for orbit timing input");
            }
            Self::parse_orbtiming(&content)?
        };
        timeline.validate_physical();

        Ok(timeline)
    }

    /// Read an EOF file, keeping the state vectors inside `window`
    pub fn read_eof_file<P: AsRef<Path>>(path: P, window: Option<&OrbitWindow>) -> LosResult<OrbitTimeline> {
        log::info!("Reading EOF orbit file: {}", path.as_ref().display());

        let content = fs::read_to_string(&path)?;
        let timeline = Self::parse_eof(&content, window)?;
        timeline.validate_physical();

        Ok(timeline)
    }

    /// Parse EOF XML into a timeline.
    ///
    /// Times become seconds since UTC midnight of the first retained state
    /// vector, the same clock orbit timing files use.
    pub fn parse_eof(content: &str, window: Option<&OrbitWindow>) -> LosResult<OrbitTimeline> {
        let document: EarthExplorerFile = quick_xml::de::from_str(content)
            .map_err(|e| LosError::InvalidFormat(format!("Failed to parse EOF orbit file: {}", e)))?;
        let osvs = document.data_block.osv_list.osvs;
        log::debug!("EOF file lists {} state vectors", osvs.len());

        let mut stamped = Vec::with_capacity(osvs.len());
        for osv in &osvs {
            let utc = parse_utc(&osv.utc)?;
            if window.map_or(true, |w| w.contains(&utc)) {
                stamped.push((utc, osv));
            }
        }
        stamped.sort_by_key(|(utc, _)| *utc);
        let before = stamped.len();
        stamped.dedup_by_key(|(utc, _)| *utc);
        if stamped.len() < before {
            log::debug!("Dropped {} duplicate state vectors", before - stamped.len());
        }

        let first = match stamped.first() {
            Some((utc, _)) => *utc,
            None => {
                return Err(match window {
                    Some(w) => LosError::InvalidInput(format!(
                        "No orbit state vectors between {} and {}",
                        w.start, w.end
                    )),
                    None => LosError::InvalidFormat("EOF file contains no state vectors".to_string()),
                })
            }
        };
        let midnight = first
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
            .ok_or_else(|| LosError::Processing(format!("No midnight for {}", first)))?;

        let mut state_vectors = Vec::with_capacity(stamped.len());
        for (utc, osv) in &stamped {
            let micros = (*utc - midnight).num_microseconds().ok_or_else(|| {
                LosError::InvalidInput(format!("State vector time {} too far from {}", utc, midnight))
            })?;
            state_vectors.push(StateVector {
                time: micros as f64 * 1e-6,
                position: [osv.x.value, osv.y.value, osv.z.value],
                velocity: [osv.vx.value, osv.vy.value, osv.vz.value],
            });
        }
        log::info!(
            "Kept {} of {} orbit state vectors, reference day {}",
            state_vectors.len(),
            osvs.len(),
            midnight.date_naive()
        );

        OrbitTimeline::new(state_vectors)
    }

    /// Parse orbit timing text. Accelerations are read and discarded.
    pub fn parse_orbtiming(content: &str) -> LosResult<OrbitTimeline> {
        let mut tokens = content.split_whitespace();

        for i in 0..HEADER_VALUES {
            tokens.next().ok_or_else(|| {
                LosError::InvalidFormat(format!("Orbit timing file ends inside header (value {})", i + 1))
            })?;
        }

        let count_token = tokens.next().ok_or_else(|| {
            LosError::InvalidFormat("Orbit timing file is missing the state vector count".to_string())
        })?;
        let count: usize = count_token.parse().map_err(|e| {
            LosError::InvalidFormat(format!("Invalid state vector count '{}': {}", count_token, e))
        })?;
        log::info!("num orbit states: {}", count);

        let mut state_vectors = Vec::with_capacity(count);
        for row in 0..count {
            let mut fields = [0.0; ROW_FIELDS];
            for (field, name) in fields.iter_mut().zip(FIELD_NAMES.iter()) {
                let token = tokens.next().ok_or_else(|| {
                    LosError::InvalidFormat(format!(
                        "Orbit timing file truncated: expected {} state vectors, row {} is missing '{}'",
                        count,
                        row + 1,
                        name
                    ))
                })?;
                *field = token.parse().map_err(|e| {
                    LosError::InvalidFormat(format!(
                        "Invalid '{}' value '{}' in state vector row {}: {}",
                        name,
                        token,
                        row + 1,
                        e
                    ))
                })?;
            }

            state_vectors.push(StateVector {
                time: fields[0],
                position: [fields[1], fields[2], fields[3]],
                velocity: [fields[4], fields[5], fields[6]],
            });
        }

        let trailing = tokens.count();
        if trailing > 0 {
            log::warn!("Ignoring {} trailing values after {} state vectors", trailing, count);
        }

        OrbitTimeline::new(state_vectors)
    }
}
