//! Screen-geometry data model.
//!
//! These are the wire and dataset types shared by the attachment parser, the
//! per-device measurer and the dataset assembler:
//!
//! - [`RawAttachment`] — one decoded measurement file, tagged with its
//!   orientation.
//! - [`OrientedDimensions`] — the nested geometry payload for one
//!   orientation: screen size, the three inset frames and the size-class
//!   pair.
//! - [`Dimensions`] — the orientation-merged record that makes up the final
//!   dataset, one per unique device class.
//! - [`PlatformDescriptor`] — the sidecar naming the platform/OS version a
//!   run measured against.
//!
//! All field names follow the attachment producer's camelCase convention on
//! the wire. Equality on [`Dimensions`] is full structural equality, which is
//! what deduplication uses; [`Dimensions::hash_key`] is only ever a sort key.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Device orientation an attachment was captured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Height >= width.
    Portrait,
    /// Width > height.
    Landscape,
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Orientation::Portrait => write!(f, "portrait"),
            Orientation::Landscape => write!(f, "landscape"),
        }
    }
}

/// Coarse layout compactness along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    Compact,
    Regular,
}

/// Horizontal/vertical size-class pair for one orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeClassPair {
    pub horizontal: SizeClass,
    pub vertical: SizeClass,
}

/// Screen extent in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: f64,
    pub height: f64,
}

/// One inset frame in points, measured inward from each screen edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeInsets {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

/// The geometry payload for a single orientation.
///
/// The three frames narrow progressively: safe area (inside hardware-unsafe
/// edges), layout margins, readable content.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrientedDimensions {
    pub screen: ScreenSize,
    pub safe_area: EdgeInsets,
    pub layout_margins: EdgeInsets,
    pub readable_content: EdgeInsets,
    pub size_classes: SizeClassPair,
}

/// One decoded measurement attachment.
///
/// Produced once per orientation per device per run by the measurement
/// harness; immutable after parse. `device` is the raw device-class tag the
/// harness reports (e.g. "iPhone"), not the simulator identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAttachment {
    pub orientation: Orientation,
    pub device: String,
    /// Pixel-per-point ratio. Positive.
    pub scale: f64,
    /// Corner radius in points. 0 means no rounded corners.
    pub radius: f64,
    #[serde(flatten)]
    pub dimensions: OrientedDimensions,
}

impl RawAttachment {
    /// Validate field constraints that the JSON schema alone cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.scale > 0.0 && self.scale.is_finite()) {
            return Err(format!("scale must be a positive number, got {}", self.scale));
        }
        if !(self.radius >= 0.0 && self.radius.is_finite()) {
            return Err(format!("radius must be >= 0, got {}", self.radius));
        }
        if self.device.is_empty() {
            return Err("device tag cannot be empty".to_string());
        }
        Ok(())
    }
}

/// The orientation-merged geometry record for one device class.
///
/// This is the unit of the output dataset. Both orientations are always
/// present: the constructor takes both, and upstream folding fails loudly if
/// either slot never received an attachment. Two records are duplicates iff
/// their full structural content is equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub device: String,
    pub scale: f64,
    pub radius: f64,
    pub portrait: OrientedDimensions,
    pub landscape: OrientedDimensions,
}

impl Dimensions {
    /// Canonical serialized form of this record.
    ///
    /// serde_json emits struct fields in definition order, so for a fixed
    /// record shape this is a stable byte representation. Every value in the
    /// model arrived through JSON decoding and is therefore finite, so
    /// re-encoding cannot fail.
    #[allow(clippy::expect_used)]
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(self).expect("geometry records are always JSON-encodable")
    }

    /// Stable, order-independent fingerprint used as the dataset sort key.
    ///
    /// SHA-256 over the canonical JSON, truncated to the first eight bytes.
    /// Structurally equal records always hash equal, and the value does not
    /// depend on process state, insertion order or randomized hasher seeds.
    /// Deduplication never consults this key; equal keys from unequal records
    /// are broken deterministically by the assembler.
    pub fn hash_key(&self) -> u64 {
        let digest = Sha256::digest(self.canonical_json().as_bytes());
        u64::from_be_bytes([
            digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
        ])
    }
}

/// Sidecar descriptor recording the platform a dataset was measured against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformDescriptor {
    /// Platform name, e.g. "iOS".
    pub name: String,
    /// OS version string, e.g. "17.5".
    pub version: String,
}

/// Record fixtures shared by unit tests across modules.
#[cfg(test)]
pub(crate) mod testutil {
    use super::*;

    pub(crate) fn sample_oriented(width: f64, height: f64) -> OrientedDimensions {
        OrientedDimensions {
            screen: ScreenSize { width, height },
            safe_area: EdgeInsets {
                top: 47.0,
                right: 0.0,
                bottom: 34.0,
                left: 0.0,
            },
            layout_margins: EdgeInsets {
                top: 47.0,
                right: 16.0,
                bottom: 34.0,
                left: 16.0,
            },
            readable_content: EdgeInsets {
                top: 47.0,
                right: 16.0,
                bottom: 34.0,
                left: 16.0,
            },
            size_classes: SizeClassPair {
                horizontal: SizeClass::Compact,
                vertical: SizeClass::Regular,
            },
        }
    }

    pub(crate) fn sample_record(device: &str, radius: f64) -> Dimensions {
        Dimensions {
            device: device.to_string(),
            scale: 3.0,
            radius,
            portrait: sample_oriented(390.0, 844.0),
            landscape: sample_oriented(844.0, 390.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::{sample_oriented, sample_record};
    use super::*;

    #[test]
    fn hash_key_is_stable_for_equal_records() {
        let a = sample_record("iPhone", 0.0);
        let b = sample_record("iPhone", 0.0);
        assert_eq!(a, b);
        assert_eq!(a.hash_key(), b.hash_key());
    }

    #[test]
    fn hash_key_differs_for_radius_change() {
        let a = sample_record("iPhone", 0.0);
        let b = sample_record("iPhone", 6.0);
        assert_ne!(a, b);
        assert_ne!(a.hash_key(), b.hash_key());
    }

    #[test]
    fn hash_key_survives_a_serialization_round_trip() {
        // A record rebuilt from its own canonical form must keep its key,
        // or regenerated datasets would reorder and diff spuriously.
        let record = sample_record("iPhone", 0.0);
        let rehashed: Dimensions =
            serde_json::from_str(&record.canonical_json()).expect("round-trip");
        assert_eq!(record.hash_key(), rehashed.hash_key());
    }

    #[test]
    fn attachment_decodes_camel_case_wire_format() {
        let json = r#"{
            "orientation": "portrait",
            "device": "iPhone",
            "scale": 3,
            "radius": 47.33,
            "screen": { "width": 390, "height": 844 },
            "safeArea": { "top": 47, "right": 0, "bottom": 34, "left": 0 },
            "layoutMargins": { "top": 47, "right": 16, "bottom": 34, "left": 16 },
            "readableContent": { "top": 47, "right": 16, "bottom": 34, "left": 16 },
            "sizeClasses": { "horizontal": "compact", "vertical": "regular" }
        }"#;
        let attachment: RawAttachment = serde_json::from_str(json).expect("decode");
        assert_eq!(attachment.orientation, Orientation::Portrait);
        assert_eq!(attachment.device, "iPhone");
        assert_eq!(attachment.scale, 3.0);
        assert_eq!(attachment.dimensions.screen.width, 390.0);
        assert_eq!(attachment.dimensions.safe_area.top, 47.0);
        assert!(attachment.validate().is_ok());
    }

    #[test]
    fn attachment_validation_rejects_bad_scale_and_radius() {
        let mut attachment = RawAttachment {
            orientation: Orientation::Portrait,
            device: "iPhone".into(),
            scale: 0.0,
            radius: 0.0,
            dimensions: sample_oriented(390.0, 844.0),
        };
        assert!(attachment.validate().is_err());

        attachment.scale = 3.0;
        attachment.radius = -1.0;
        assert!(attachment.validate().is_err());

        attachment.radius = 0.0;
        attachment.device.clear();
        assert!(attachment.validate().is_err());
    }
}
