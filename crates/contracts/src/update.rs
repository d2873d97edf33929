use serde::{Deserialize, Deserializer};

#[derive(Debug, Clone, PartialEq)]
pub enum Patch<T> {
    Absent,
    Null,
    Value(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Absent
    }
}

impl<T> Patch<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Patch::Absent)
    }
}

impl<'de, T> Deserialize<'de> for Patch<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<T>::deserialize(deserializer)? {
            None => Patch::Null,
            Some(v) => Patch::Value(v),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(i64::from(value))
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateRequest {
    fields: Vec<(String, FieldValue)>,
}

impl UpdateRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        let field = field.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == field) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((field, value)),
        }
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn patch<T>(&mut self, field: &str, patch: &Patch<T>)
    where
        T: Clone + Into<FieldValue>,
    {
        match patch {
            Patch::Absent => {}
            Patch::Null => self.insert(field, FieldValue::Null),
            Patch::Value(v) => self.insert(field, v.clone()),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Body {
        #[serde(default)]
        email: Patch<String>,
        #[serde(default)]
        model_year: Patch<i32>,
    }

    #[test]
    fn patch_distinguishes_absent_null_and_value() {
        let body: Body = serde_json::from_str(r#"{"email": null}"#).unwrap();
        assert_eq!(body.email, Patch::Null);
        assert_eq!(body.model_year, Patch::Absent);

        let body: Body = serde_json::from_str(r#"{"model_year": 2004}"#).unwrap();
        assert_eq!(body.model_year, Patch::Value(2004));
        assert!(body.email.is_absent());
    }

    #[test]
    fn insert_replaces_in_place() {
        let req = UpdateRequest::new()
            .with("a", 1)
            .with("b", 2)
            .with("a", "again");

        assert_eq!(req.len(), 2);
        assert_eq!(
            req.iter().collect::<Vec<_>>(),
            vec![
                ("a", &FieldValue::Text("again".to_string())),
                ("b", &FieldValue::Int(2)),
            ]
        );
    }
}
