use super::attribute::{AttributeMap, AttributeValue, Identity};
use super::error::{PickerError, PickerResult};

/// Identities offered to the user, addressed by their ordinal position.
///
/// String indices ("0", "1", ...) only exist at the edges: the session model, the
/// template view data and the submitted form field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateSet {
    identities: Vec<Identity>,
}

impl CandidateSet {
    pub fn new(identities: Vec<Identity>) -> Self { Self { identities } }

    /// Build from the pending list parked by the action. Every entry must be a map.
    pub fn from_pending(value: AttributeValue) -> PickerResult<Self> {
        let items = match value {
            AttributeValue::List(items) => items,
            other => {
                return Err(PickerError::Shape(format!("Identities was not in expected format, found {}", other.kind())));
            }
        };
        let identities = items
            .into_iter()
            .map(|item| match item {
                AttributeValue::Map(map) => Ok(Identity::new(map)),
                other => Err(PickerError::Shape(format!("Identity was not a map, found {}", other.kind()))),
            })
            .collect::<PickerResult<Vec<_>>>()?;
        Ok(Self { identities })
    }

    /// Decode the index-keyed form. Keys must be exactly "0".."N-1"; they are ordered
    /// numerically regardless of the map's own ordering.
    pub fn from_index_map(map: AttributeMap) -> PickerResult<Self> {
        let mut indexed: Vec<(usize, Identity)> = Vec::with_capacity(map.len());
        for (key, value) in map {
            let ordinal = parse_ordinal(&key)
                .ok_or_else(|| PickerError::Shape(format!("'{}' is not an identity index", key)))?;
            let identity = Identity::try_from(value)?;
            indexed.push((ordinal, identity));
        }
        indexed.sort_by_key(|(ordinal, _)| *ordinal);
        if let Some((pos, (ordinal, _))) = indexed.iter().enumerate().find(|(pos, (ordinal, _))| pos != ordinal) {
            return Err(PickerError::Shape(format!("identity index {} found at position {}", ordinal, pos)));
        }
        Ok(Self { identities: indexed.into_iter().map(|(_, identity)| identity).collect() })
    }

    pub fn to_index_map(&self) -> AttributeMap {
        self.iter()
            .map(|(ordinal, identity)| (ordinal.to_string(), AttributeValue::from(identity.clone())))
            .collect()
    }

    pub fn len(&self) -> usize { self.identities.len() }

    pub fn is_empty(&self) -> bool { self.identities.is_empty() }

    pub fn get(&self, ordinal: usize) -> Option<&Identity> { self.identities.get(ordinal) }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Identity)> {
        self.identities.iter().enumerate()
    }

    /// Resolve a submitted index. Only the canonical decimal form matches.
    pub fn resolve(&self, index: &str) -> Option<&Identity> {
        parse_ordinal(index).and_then(|ordinal| self.get(ordinal))
    }

    /// Index map as JSON, the form templates receive.
    pub fn to_view_data(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.iter()
                .map(|(ordinal, identity)| (ordinal.to_string(), AttributeValue::from(identity.clone()).to_json()))
                .collect(),
        )
    }
}

fn parse_ordinal(s: &str) -> Option<usize> {
    let ordinal: usize = s.parse().ok()?;
    (ordinal.to_string() == s).then_some(ordinal)
}
