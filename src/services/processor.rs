use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io;
use std::time::Instant;
use strum::Display;

use crate::models::item::Item;

/// Tag recorded in every enrichment block.
pub const PROCESSOR_VERSION: &str = "ItemProcessor-v1.0";

/// Payload sizes, as measured by [`serialized_len`], above which an item
/// counts as MEDIUM / HIGH complexity.
const MEDIUM_COMPLEXITY_BYTES: usize = 1_000;
const HIGH_COMPLEXITY_BYTES: usize = 10_000;

/// Item after the transform step: type tag canonicalized, payload untouched.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransformedItem {
    pub item_id: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub payload: Value,
    pub metadata: ItemMetadata,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItemMetadata {
    pub original_size: usize,
    pub has_payload: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Display, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Serialize, Display, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Category {
    Media,
    Content,
    Other,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Enrichment {
    pub processed_by: &'static str,
    pub complexity: Complexity,
    pub category: Category,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EnrichedItem {
    #[serde(flatten)]
    pub item: TransformedItem,
    pub enrichment: Enrichment,
}

/// Output of the full processing sequence for one item.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedItem {
    pub item_id: String,
    /// Type tag as submitted (not canonicalized).
    pub item_type: String,
    pub fingerprint: String,
    pub duration_ms: i64,
    pub is_valid: bool,
    pub processed_data: Value,
}

/// Structural check applied to items of one type tag.
pub trait ItemValidator: Send + Sync {
    fn validate(&self, item: &TransformedItem) -> bool;
}

/// Media that can be fetched or is carried inline: needs `url` or `data`.
pub struct LocatableMedia;

impl ItemValidator for LocatableMedia {
    fn validate(&self, item: &TransformedItem) -> bool {
        has_field(&item.payload, "url") || has_field(&item.payload, "data")
    }
}

/// Media with a running time: needs both `url` and `duration`.
pub struct TimedMedia;

impl ItemValidator for TimedMedia {
    fn validate(&self, item: &TransformedItem) -> bool {
        has_field(&item.payload, "url") && has_field(&item.payload, "duration")
    }
}

fn has_field(payload: &Value, key: &str) -> bool {
    payload.as_object().is_some_and(|map| map.contains_key(key))
}

/// Validators keyed by canonical type tag. Unregistered tags pass.
pub struct ValidatorRegistry {
    validators: HashMap<String, Box<dyn ItemValidator>>,
}

impl ValidatorRegistry {
    pub fn empty() -> Self {
        Self {
            validators: HashMap::new(),
        }
    }

    pub fn register(&mut self, item_type: &str, validator: impl ItemValidator + 'static) {
        self.validators
            .insert(item_type.to_uppercase(), Box::new(validator));
    }

    /// Required fields first, then the type-specific rule if one is registered.
    pub fn validate(&self, item: &TransformedItem) -> bool {
        if item.item_id.is_empty() || item.item_type.is_empty() {
            return false;
        }

        self.validators
            .get(&item.item_type)
            .map_or(true, |validator| validator.validate(item))
    }
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("IMAGE", LocatableMedia);
        registry.register("VIDEO", TimedMedia);
        registry
    }
}

/// Runs Transform → Validate → Enrich → Fingerprint over single items.
/// Deterministic: equal items always yield equal fingerprints.
#[derive(Default)]
pub struct ItemProcessor {
    validators: ValidatorRegistry,
}

impl ItemProcessor {
    pub fn new(validators: ValidatorRegistry) -> Self {
        Self { validators }
    }

    pub fn process(&self, item: &Item) -> Result<ProcessedItem, ProcessingError> {
        let start = Instant::now();

        let transformed = transform(item)?;
        let is_valid = self.validators.validate(&transformed);
        let enriched = enrich(transformed)?;
        let processed_data = serde_json::to_value(&enriched)?;
        let fingerprint = fingerprint(&processed_data)?;

        let duration_ms = start.elapsed().as_millis() as i64;

        tracing::debug!(
            item_id = %item.item_id,
            item_type = %item.item_type,
            is_valid,
            complexity = %enriched.enrichment.complexity,
            category = %enriched.enrichment.category,
            "Item processed"
        );

        Ok(ProcessedItem {
            item_id: item.item_id.clone(),
            item_type: item.item_type.clone(),
            fingerprint,
            duration_ms,
            is_valid,
            processed_data,
        })
    }
}

pub fn transform(item: &Item) -> Result<TransformedItem, ProcessingError> {
    let original_size = serialized_len(item)?;
    let payload = item
        .payload
        .clone()
        .unwrap_or_else(|| Value::Object(Default::default()));

    Ok(TransformedItem {
        item_id: item.item_id.clone(),
        item_type: item.item_type.to_uppercase(),
        metadata: ItemMetadata {
            original_size,
            has_payload: is_truthy(item.payload.as_ref()),
        },
        payload,
    })
}

pub fn enrich(item: TransformedItem) -> Result<EnrichedItem, ProcessingError> {
    let enrichment = Enrichment {
        processed_by: PROCESSOR_VERSION,
        complexity: complexity(&item.payload)?,
        category: categorize(&item.item_type),
    };
    Ok(EnrichedItem { item, enrichment })
}

pub fn complexity(payload: &Value) -> Result<Complexity, ProcessingError> {
    let size = serialized_len(payload)?;
    Ok(if size > HIGH_COMPLEXITY_BYTES {
        Complexity::High
    } else if size > MEDIUM_COMPLEXITY_BYTES {
        Complexity::Medium
    } else {
        Complexity::Low
    })
}

pub fn categorize(item_type: &str) -> Category {
    match item_type {
        "IMAGE" | "VIDEO" => Category::Media,
        "TEXT" | "DOCUMENT" => Category::Content,
        _ => Category::Other,
    }
}

/// SHA-256 hex digest over the compact serialization of `value`.
///
/// `serde_json::Map` keeps keys sorted, so the serialization is canonical.
pub fn fingerprint(value: &Value) -> Result<String, ProcessingError> {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(value)?);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Length of `value` serialized with `", "` and `": "` separators and every
/// non-ASCII character escaped as `\uXXXX`.
///
/// Item sizes and complexity thresholds are defined over this layout, not
/// over compact JSON.
pub fn serialized_len<T: Serialize + ?Sized>(value: &T) -> Result<usize, ProcessingError> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedAsciiFormatter);
    value.serialize(&mut ser)?;
    Ok(buf.len())
}

struct SpacedAsciiFormatter;

impl Formatter for SpacedAsciiFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W: ?Sized + io::Write>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()> {
        let mut start = 0;
        for (i, c) in fragment.char_indices() {
            if c.is_ascii() && c != '\x7f' {
                continue;
            }
            writer.write_all(&fragment.as_bytes()[start..i])?;
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }
            start = i + c.len_utf8();
        }
        writer.write_all(&fragment.as_bytes()[start..])
    }
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Failed to serialize item: {0}")]
    Serialize(#[from] serde_json::Error),
}
