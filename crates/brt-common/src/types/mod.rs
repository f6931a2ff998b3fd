//! Feed data types
//!
//! The GPS feed has no fixed record schema: field sets change between feed
//! versions without notice. Records are therefore kept as open JSON maps and
//! only the presence and shape of the `vehicles` container is checked.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{BrtError, Result};

/// Key holding the vehicle list in a feed response.
pub const VEHICLES_KEY: &str = "vehicles";

/// One vehicle entry of the feed, field name to JSON value.
///
/// Key order is preserved (`serde_json` is built with `preserve_order`).
pub type VehicleRecord = Map<String, Value>;

/// A full feed response captured at one point in time.
///
/// Invariant: when present, `vehicles` is an array of JSON objects. An absent
/// `vehicles` key makes the snapshot empty.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub struct Snapshot {
    fields: Map<String, Value>,
}

impl Snapshot {
    /// Decode a response body.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(body)?;
        Self::try_from(value)
    }

    /// Build a snapshot holding only the given vehicles.
    pub fn from_vehicles(vehicles: Vec<VehicleRecord>) -> Self {
        let mut fields = Map::new();
        fields.insert(
            VEHICLES_KEY.to_string(),
            Value::Array(vehicles.into_iter().map(Value::Object).collect()),
        );
        Self { fields }
    }

    /// All top-level fields, in feed order.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Whether the `vehicles` key is present at all.
    pub fn has_vehicles(&self) -> bool {
        self.fields.contains_key(VEHICLES_KEY)
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &VehicleRecord> {
        self.fields
            .get(VEHICLES_KEY)
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_object)
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles().count()
    }

    /// True when there is nothing to load.
    pub fn is_empty(&self) -> bool {
        self.vehicle_count() == 0
    }

    /// Consume the snapshot, returning its vehicles if the key was present.
    pub fn into_vehicles(self) -> Option<Vec<VehicleRecord>> {
        extract_vehicles(Value::Object(self.fields))
    }
}

impl TryFrom<Value> for Snapshot {
    type Error = BrtError;

    fn try_from(value: Value) -> Result<Self> {
        let Value::Object(fields) = value else {
            return Err(BrtError::invalid_shape(format!(
                "expected a JSON object, got {}",
                kind_of(&value)
            )));
        };

        if let Some(vehicles) = fields.get(VEHICLES_KEY) {
            let items = vehicles.as_array().ok_or_else(|| {
                BrtError::invalid_shape(format!(
                    "`{}` must be an array, got {}",
                    VEHICLES_KEY,
                    kind_of(vehicles)
                ))
            })?;

            if let Some((index, item)) = items.iter().enumerate().find(|(_, v)| !v.is_object()) {
                return Err(BrtError::invalid_shape(format!(
                    "`{}[{}]` must be an object, got {}",
                    VEHICLES_KEY,
                    index,
                    kind_of(item)
                )));
            }
        }

        Ok(Self { fields })
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

/// Lenient extraction used when reading snapshots back from disk.
///
/// Returns `None` when the value is not an object, has no `vehicles` key, or
/// the key does not hold an array of objects. Never fails.
pub fn extract_vehicles(value: Value) -> Option<Vec<VehicleRecord>> {
    let Value::Object(mut fields) = value else {
        return None;
    };
    let Value::Array(items) = fields.remove(VEHICLES_KEY)? else {
        return None;
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::Object(record) => Some(record),
            _ => None,
        })
        .collect()
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
