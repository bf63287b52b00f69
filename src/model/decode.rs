//! Decoding backend JSON into records.
//!
//! A malformed record inside an otherwise valid section is skipped and
//! counted; only a malformed payload or section fails the whole decode.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::records::{RawCask, RawFormula, RawTap};
use super::{CaskRecord, FormulaRecord, PackageKind, PackageRecord, TapRecord, UnifiedPackage};

/// Payload-level decode failures.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Not valid JSON at all.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// Top-level value is not an object.
    #[error("expected a JSON object at the top level")]
    NotAnObject,
    /// A section is present but is not an array.
    #[error("section `{section}` is not an array")]
    SectionNotArray {
        /// Section name.
        section: &'static str,
    },
}

/// What: Decoded `{formulae?, casks?}` payload.
///
/// Details:
/// - `skipped` counts records dropped because they failed to decode.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Envelope {
    /// Formula records in payload order.
    pub formulae: Vec<FormulaRecord>,
    /// Cask records in payload order.
    pub casks: Vec<CaskRecord>,
    /// Records skipped as malformed.
    pub skipped: usize,
}

impl Envelope {
    /// Unified view of the formulae.
    #[must_use]
    pub fn formula_packages(&self) -> Vec<UnifiedPackage> {
        self.formulae.iter().map(UnifiedPackage::from).collect()
    }

    /// Unified view of the casks.
    #[must_use]
    pub fn cask_packages(&self) -> Vec<UnifiedPackage> {
        self.casks.iter().map(UnifiedPackage::from).collect()
    }

    /// Unified view of everything, formulae first.
    #[must_use]
    pub fn packages(&self) -> Vec<UnifiedPackage> {
        let mut all = self.formula_packages();
        all.extend(self.cask_packages());
        all
    }

    /// Consume into tagged records, formulae first.
    #[must_use]
    pub fn into_records(self) -> Vec<PackageRecord> {
        self.formulae
            .into_iter()
            .map(PackageRecord::Formula)
            .chain(self.casks.into_iter().map(PackageRecord::Cask))
            .collect()
    }

    /// What: Treat every record as outdated unless it says otherwise.
    ///
    /// Details:
    /// - Used for `outdated` reports, whose records usually omit the flag.
    pub fn mark_outdated(&mut self) {
        for f in &mut self.formulae {
            f.outdated.get_or_insert(true);
        }
        for c in &mut self.casks {
            c.outdated.get_or_insert(true);
        }
    }
}

/// What: Decode a `{formulae?, casks?}` payload.
///
/// Inputs:
/// - `raw`: Backend stdout.
///
/// Output:
/// - [`Envelope`] with absent or `null` sections as empty lists.
///
/// # Errors
/// - [`DecodeError::Json`] for invalid JSON.
/// - [`DecodeError::NotAnObject`] when the top level is not an object.
/// - [`DecodeError::SectionNotArray`] when a section has the wrong type.
pub fn decode_envelope(raw: &str) -> Result<Envelope, DecodeError> {
    let value: Value = serde_json::from_str(raw)?;
    let Value::Object(mut map) = value else {
        return Err(DecodeError::NotAnObject);
    };
    let mut skipped = 0;
    let formulae = decode_section::<RawFormula, FormulaRecord>(&mut map, "formulae", &mut skipped)?;
    let casks = decode_section::<RawCask, CaskRecord>(&mut map, "casks", &mut skipped)?;
    debug!(
        formulae = formulae.len(),
        casks = casks.len(),
        skipped,
        "decoded package envelope"
    );
    Ok(Envelope {
        formulae,
        casks,
        skipped,
    })
}

/// Decode one kind's section of an envelope into unified packages.
///
/// # Errors
/// - Same as [`decode_envelope`].
pub fn decode(raw: &str, kind: PackageKind) -> Result<Vec<UnifiedPackage>, DecodeError> {
    let envelope = decode_envelope(raw)?;
    Ok(match kind {
        PackageKind::Formula => envelope.formula_packages(),
        PackageKind::Cask => envelope.cask_packages(),
    })
}

/// What: Decode `tap --json` output.
///
/// Inputs:
/// - `raw`: Either `{"taps": [...]}` or a bare array of tap records.
///
/// Output:
/// - Tap records; malformed entries are skipped.
///
/// # Errors
/// - [`DecodeError::Json`] for invalid JSON.
/// - [`DecodeError::NotAnObject`] when the payload is neither object nor array.
/// - [`DecodeError::SectionNotArray`] when `taps` has the wrong type.
pub fn decode_taps(raw: &str) -> Result<Vec<TapRecord>, DecodeError> {
    let value: Value = serde_json::from_str(raw)?;
    let mut skipped = 0;
    let taps = match value {
        Value::Array(items) => decode_items::<RawTap, TapRecord>(items, "taps", &mut skipped),
        Value::Object(mut map) => decode_section::<RawTap, TapRecord>(&mut map, "taps", &mut skipped)?,
        _ => return Err(DecodeError::NotAnObject),
    };
    debug!(taps = taps.len(), skipped, "decoded taps");
    Ok(taps)
}

fn decode_section<W, T>(
    map: &mut Map<String, Value>,
    section: &'static str,
    skipped: &mut usize,
) -> Result<Vec<T>, DecodeError>
where
    W: DeserializeOwned,
    T: From<W>,
{
    match map.remove(section) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(decode_items::<W, T>(items, section, skipped)),
        Some(_) => Err(DecodeError::SectionNotArray { section }),
    }
}

fn decode_items<W, T>(items: Vec<Value>, section: &'static str, skipped: &mut usize) -> Vec<T>
where
    W: DeserializeOwned,
    T: From<W>,
{
    let mut out = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<W>(item) {
            Ok(wire) => out.push(T::from(wire)),
            Err(e) => {
                warn!(section, index, error = %e, "skipping malformed record");
                *skipped += 1;
            }
        }
    }
    out
}
