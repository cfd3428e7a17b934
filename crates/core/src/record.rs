//! Stored entity records.
//!
//! Records hold references to other entities as `{id, @type, name?}` stubs,
//! never embedded copies. A record with a `deleteDate` is logically deleted:
//! it stays in the store but is hidden from every read.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::kind::EntityKind;

/// Common surface of the three stored records.
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> &str;

    fn delete_date(&self) -> Option<DateTime<Utc>>;

    fn is_active(&self) -> bool {
        self.delete_date().is_none()
    }
}

/// Reference to another entity by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub id: String,

    #[serde(rename = "@type", default)]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Reference {
    pub fn stub(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.type_name().to_string(),
            name: None,
        }
    }

    /// Force the stub's `@type` to the referenced entity's fixed type and drop
    /// empty names.
    pub fn normalized(mut self, kind: EntityKind) -> Self {
        self.kind = kind.type_name().to_string();
        if self.name.as_deref().is_some_and(str::is_empty) {
            self.name = None;
        }
        self
    }
}

/// Normalize a whole reference list, dropping entries without an id.
pub fn normalize_refs(refs: Vec<Reference>, kind: EntityKind) -> Vec<Reference> {
    refs.into_iter()
        .filter(|r| !r.id.is_empty())
        .map(|r| r.normalized(kind))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Price {
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    #[serde(rename = "@type", default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub products: Vec<Reference>,
    #[serde(default, with = "crate::time::lenient")]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(default, with = "crate::time::lenient")]
    pub delete_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    #[serde(rename = "@type", default)]
    pub kind: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub category: Vec<Reference>,
    #[serde(default)]
    pub product_price: Vec<Reference>,
    #[serde(default, with = "crate::time::lenient")]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(default, with = "crate::time::lenient")]
    pub delete_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPrice {
    pub id: String,
    #[serde(rename = "@type", default)]
    pub kind: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    #[serde(default, with = "crate::time::lenient")]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(default, with = "crate::time::lenient")]
    pub delete_date: Option<DateTime<Utc>>,
}

macro_rules! impl_record {
    ($t:ty, $kind:expr) => {
        impl Record for $t {
            const KIND: EntityKind = $kind;

            fn id(&self) -> &str {
                &self.id
            }

            fn delete_date(&self) -> Option<DateTime<Utc>> {
                self.delete_date
            }
        }
    };
}

impl_record!(Category, EntityKind::Category);
impl_record!(Product, EntityKind::Product);
impl_record!(ProductPrice, EntityKind::ProductPrice);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn product_uses_wire_field_names() {
        let product = Product {
            id: "x1".into(),
            kind: "products".into(),
            title: "Mug".into(),
            product_price: vec![Reference::stub(EntityKind::ProductPrice, "p1")],
            ..Default::default()
        };

        let v = serde_json::to_value(&product).unwrap();
        assert_eq!(v["@type"], "products");
        assert_eq!(v["productPrice"][0], json!({"id": "p1", "@type": "productPrice"}));
        assert!(v["deleteDate"].is_null());
        assert!(v.get("lastUpdate").is_some());
    }

    #[test]
    fn zero_delete_date_decodes_as_active() {
        let price: ProductPrice = serde_json::from_value(json!({
            "id": "p1",
            "name": "retail",
            "deleteDate": "0001-01-01T00:00:00Z",
        }))
        .unwrap();
        assert!(price.is_active());
    }

    #[test]
    fn normalize_refs_fixes_type_and_drops_blank_ids() {
        let refs = vec![
            Reference { id: "c1".into(), kind: "whatever".into(), name: Some(String::new()) },
            Reference { id: String::new(), kind: String::new(), name: None },
        ];
        let out = normalize_refs(refs, EntityKind::Category);
        assert_eq!(out, vec![Reference::stub(EntityKind::Category, "c1")]);
    }

    proptest::proptest! {
        #[test]
        fn normalized_refs_are_typed_and_never_blank(
            raw in proptest::collection::vec(("[a-z0-9]{0,4}", ".{0,6}", proptest::option::of("[a-z]{0,3}")), 0..12)
        ) {
            let refs: Vec<Reference> = raw
                .iter()
                .map(|(id, kind, name)| Reference { id: id.clone(), kind: kind.clone(), name: name.clone() })
                .collect();
            let expected = refs.iter().filter(|r| !r.id.is_empty()).count();

            let out = normalize_refs(refs, EntityKind::ProductPrice);
            proptest::prop_assert_eq!(out.len(), expected);
            for r in &out {
                proptest::prop_assert!(!r.id.is_empty());
                proptest::prop_assert_eq!(r.kind.as_str(), "productPrice");
                proptest::prop_assert!(r.name.as_deref() != Some(""));
            }
        }
    }
}
