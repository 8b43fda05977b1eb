//! Signal layout, resource ids and displayed faces.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use junction_common::{JunctionError, Result};
use serde::{Deserialize, Serialize};

/// Wire id of one vehicle signal (and its paired pedestrian crossing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub u8);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which signals a junction has.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JunctionLayout {
    /// Signals 1 through 4.
    #[default]
    FourWay,
    /// Signals A and B, carried on the wire as 1 and 2.
    TwoWay,
}

impl JunctionLayout {
    pub fn size(&self) -> u8 {
        match self {
            JunctionLayout::FourWay => 4,
            JunctionLayout::TwoWay => 2,
        }
    }

    pub fn resources(&self) -> impl Iterator<Item = ResourceId> {
        (1..=self.size()).map(ResourceId)
    }

    pub fn contains(&self, resource: ResourceId) -> bool {
        (1..=self.size()).contains(&resource.0)
    }

    /// Validates a wire id against this layout.
    pub fn resource(&self, id: u64) -> Result<ResourceId> {
        match u8::try_from(id) {
            Ok(raw) if self.contains(ResourceId(raw)) => Ok(ResourceId(raw)),
            _ => Err(JunctionError::InvalidResource(format!(
                "signal {} is not part of a {} junction",
                id, self
            ))),
        }
    }

    /// Human-facing name of a signal: "1".."4" or "A"/"B".
    pub fn label(&self, resource: ResourceId) -> String {
        match self {
            JunctionLayout::FourWay => resource.0.to_string(),
            JunctionLayout::TwoWay => char::from(b'A' + resource.0.saturating_sub(1)).to_string(),
        }
    }
}

impl fmt::Display for JunctionLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JunctionLayout::FourWay => write!(f, "four-way"),
            JunctionLayout::TwoWay => write!(f, "two-way"),
        }
    }
}

impl FromStr for JunctionLayout {
    type Err = JunctionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "four-way" | "4" => Ok(JunctionLayout::FourWay),
            "two-way" | "2" => Ok(JunctionLayout::TwoWay),
            other => Err(JunctionError::InvalidRequest(format!(
                "unknown layout `{}` (expected four-way or two-way)",
                other
            ))),
        }
    }
}

/// Colour a signal head is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Face {
    Red,
    Yellow,
    Green,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceStatus {
    pub vehicle: Face,
    pub pedestrian: Face,
}

/// Per-label faces of every signal in a junction.
pub type SignalSnapshot = BTreeMap<String, FaceStatus>;

/// Builds the displayed faces for `active`, with `clearing` (if any) still
/// on yellow.
///
/// The active signal's crossing is always red and every other crossing is
/// green.
pub fn snapshot(
    layout: JunctionLayout,
    active: ResourceId,
    clearing: Option<ResourceId>,
) -> SignalSnapshot {
    layout
        .resources()
        .map(|resource| {
            let vehicle = if resource == active {
                Face::Green
            } else if Some(resource) == clearing {
                Face::Yellow
            } else {
                Face::Red
            };
            let pedestrian = if resource == active { Face::Red } else { Face::Green };
            (layout.label(resource), FaceStatus { vehicle, pedestrian })
        })
        .collect()
}
