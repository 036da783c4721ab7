//! PDF object model.

use std::collections::BTreeMap;
use std::fmt;

/// Object number and generation number of an indirect object.
pub type ObjectId = (u32, u16);

/// A PDF object.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f32),
    /// Raw string bytes; text encoding is resolved later against the font.
    String(Vec<u8>),
    Name(String),
    Array(Vec<Object>),
    Dictionary(Dictionary),
    Stream(Stream),
    Reference(ObjectId),
}

impl Object {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Object::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value as f32. Accepts both integers and reals, which
    /// PDF producers use interchangeably in matrices and boxes.
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Object::Integer(i) => Some(*i as f32),
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Object]> {
        match self {
            Object::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Object::Stream(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<ObjectId> {
        match self {
            Object::Reference(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Null => write!(f, "null"),
            Object::Boolean(b) => write!(f, "{b}"),
            Object::Integer(i) => write!(f, "{i}"),
            Object::Real(r) => write!(f, "{r}"),
            Object::String(s) => write!(f, "({} bytes)", s.len()),
            Object::Name(n) => write!(f, "/{n}"),
            Object::Array(a) => write!(f, "[{} items]", a.len()),
            Object::Dictionary(_) => write!(f, "<<dict>>"),
            Object::Stream(s) => write!(f, "<<stream, {} bytes>>", s.data.len()),
            Object::Reference((num, gen)) => write!(f, "{num} {gen} R"),
        }
    }
}

/// A PDF dictionary. Keys are names without the leading slash.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary(BTreeMap<String, Object>);

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Object> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Object) {
        self.0.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Object> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Object)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get a required integer entry, tolerating a direct value only.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Object::as_i64)
    }

    pub fn get_name(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Object::as_name)
    }

    /// `/Type` entry, if any.
    pub fn type_name(&self) -> Option<&str> {
        self.get_name("Type")
    }
}

impl FromIterator<(String, Object)> for Dictionary {
    fn from_iter<T: IntoIterator<Item = (String, Object)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A stream object: dictionary plus raw (still encoded) data.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    pub dict: Dictionary,
    pub data: Vec<u8>,
}

impl Stream {
    pub fn new(dict: Dictionary, data: Vec<u8>) -> Self {
        Self { dict, data }
    }

    /// Filter chain in application order. A single name and an array
    /// of names are both accepted.
    pub fn filters(&self) -> Vec<String> {
        match self.dict.get("Filter") {
            Some(Object::Name(n)) => vec![n.clone()],
            Some(Object::Array(a)) => a
                .iter()
                .filter_map(|o| o.as_name().map(String::from))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// `/DecodeParms` aligned with the filter chain.
    pub fn decode_parms(&self) -> Vec<Option<Dictionary>> {
        let parms = self
            .dict
            .get("DecodeParms")
            .or_else(|| self.dict.get("DP"));
        match parms {
            Some(Object::Dictionary(d)) => vec![Some(d.clone())],
            Some(Object::Array(a)) => a
                .iter()
                .map(|o| match o {
                    Object::Dictionary(d) => Some(d.clone()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(Object::Integer(3).as_f32(), Some(3.0));
        assert_eq!(Object::Real(1.5).as_f32(), Some(1.5));
        assert_eq!(Object::Name("X".into()).as_f32(), None);
    }

    #[test]
    fn test_stream_filter_forms() {
        let mut dict = Dictionary::new();
        dict.set("Filter", Object::Name("FlateDecode".into()));
        let s = Stream::new(dict, vec![]);
        assert_eq!(s.filters(), vec!["FlateDecode".to_string()]);

        let mut dict = Dictionary::new();
        dict.set(
            "Filter",
            Object::Array(vec![
                Object::Name("ASCII85Decode".into()),
                Object::Name("FlateDecode".into()),
            ]),
        );
        let s = Stream::new(dict, vec![]);
        assert_eq!(s.filters().len(), 2);
        assert_eq!(s.filters()[0], "ASCII85Decode");
    }

    #[test]
    fn test_dict_through_stream() {
        let mut dict = Dictionary::new();
        dict.set("Length", Object::Integer(5));
        let obj = Object::Stream(Stream::new(dict, vec![1, 2, 3, 4, 5]));
        assert_eq!(obj.as_dict().and_then(|d| d.get_i64("Length")), Some(5));
    }
}
