//! Records exchanged with the dependent services and the composed view.
//!
//! The three record kinds mirror the JSON contracts of the item, ratings and
//! commentary services. `origin_address` identifies the physical instance that
//! answered a read; it is never set on records we write.
//!
//! All types serialize with `camelCase` field names.

use serde::{Deserialize, Serialize};

/// Identifier of a catalog item. Ratings and commentary reference it too.
pub type ItemId = i32;

/// Smallest identifier the dependent services accept.
pub const MIN_ITEM_ID: ItemId = 1;

/// A catalog item as served by the item service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Item identifier
    pub id: ItemId,
    /// Display name
    pub name: String,
    /// Shipping weight
    pub weight: i32,
    /// Instance that produced this record (read responses only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_address: Option<String>,
}

impl Item {
    /// Create an item for writing (no origin address).
    #[must_use]
    pub fn new(id: ItemId, name: impl Into<String>, weight: i32) -> Self {
        Self {
            id,
            name: name.into(),
            weight,
            origin_address: None,
        }
    }
}

/// A peer rating of a catalog item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    /// Rated item
    pub item_id: ItemId,
    /// Rating identifier, unique per item
    pub rating_id: i32,
    /// Who rated
    pub author: String,
    /// Score
    pub rate: i32,
    /// Free text
    pub content: String,
    /// Instance that produced this record (read responses only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_address: Option<String>,
}

/// A commentary record attached to a catalog item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commentary {
    /// Commented item
    pub item_id: ItemId,
    /// Commentary identifier, unique per item
    pub commentary_id: i32,
    /// Who wrote it
    pub author: String,
    /// Headline
    pub subject: String,
    /// Body
    pub content: String,
    /// Instance that produced this record (read responses only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_address: Option<String>,
}

/// Rating as it appears inside an aggregate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    /// Rating identifier
    pub rating_id: i32,
    /// Who rated
    pub author: String,
    /// Score
    pub rate: i32,
    /// Free text
    pub content: String,
}

impl RatingSummary {
    /// Expand into a full rating record for `item_id`.
    #[must_use]
    pub fn into_rating(self, item_id: ItemId) -> Rating {
        Rating {
            item_id,
            rating_id: self.rating_id,
            author: self.author,
            rate: self.rate,
            content: self.content,
            origin_address: None,
        }
    }
}

impl From<&Rating> for RatingSummary {
    fn from(rating: &Rating) -> Self {
        Self {
            rating_id: rating.rating_id,
            author: rating.author.clone(),
            rate: rating.rate,
            content: rating.content.clone(),
        }
    }
}

/// Commentary as it appears inside an aggregate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentarySummary {
    /// Commentary identifier
    pub commentary_id: i32,
    /// Who wrote it
    pub author: String,
    /// Headline
    pub subject: String,
    /// Body
    pub content: String,
}

impl CommentarySummary {
    /// Expand into a full commentary record for `item_id`.
    #[must_use]
    pub fn into_commentary(self, item_id: ItemId) -> Commentary {
        Commentary {
            item_id,
            commentary_id: self.commentary_id,
            author: self.author,
            subject: self.subject,
            content: self.content,
            origin_address: None,
        }
    }
}

impl From<&Commentary> for CommentarySummary {
    fn from(commentary: &Commentary) -> Self {
        Self {
            commentary_id: commentary.commentary_id,
            author: commentary.author.clone(),
            subject: commentary.subject.clone(),
            content: commentary.content.clone(),
        }
    }
}

/// Which instance answered each part of an aggregate read.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAddresses {
    /// This composite instance
    pub composite: String,
    /// Item service instance
    pub item: String,
    /// Ratings service instance (empty when no ratings were returned)
    pub ratings: String,
    /// Commentary service instance (empty when no commentary was returned)
    pub commentary: String,
}

/// Read-only projection combining an item with its ratings and commentary.
///
/// Built fresh for every request and never stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateView {
    /// Item identifier
    pub id: ItemId,
    /// Item name
    pub name: String,
    /// Item weight
    pub weight: i32,
    /// Rating summaries
    pub ratings: Vec<RatingSummary>,
    /// Commentary summaries
    pub commentary: Vec<CommentarySummary>,
    /// Instances that answered each sub-query
    pub service_addresses: ServiceAddresses,
}

impl AggregateView {
    /// Assemble a view from the three sub-query results.
    ///
    /// Secondary addresses come from the first element of each list, or an
    /// empty string when the list is empty.
    #[must_use]
    pub fn assemble(
        item: Item,
        ratings: &[Rating],
        commentary: &[Commentary],
        composite_address: impl Into<String>,
    ) -> Self {
        let service_addresses = ServiceAddresses {
            composite: composite_address.into(),
            item: item.origin_address.clone().unwrap_or_default(),
            ratings: ratings
                .first()
                .and_then(|r| r.origin_address.clone())
                .unwrap_or_default(),
            commentary: commentary
                .first()
                .and_then(|c| c.origin_address.clone())
                .unwrap_or_default(),
        };

        Self {
            id: item.id,
            name: item.name,
            weight: item.weight,
            ratings: ratings.iter().map(RatingSummary::from).collect(),
            commentary: commentary.iter().map(CommentarySummary::from).collect(),
            service_addresses,
        }
    }
}

/// Request body for creating an aggregate.
///
/// Missing `ratings` or `commentary` lists are treated as empty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSpec {
    /// Item identifier
    pub id: ItemId,
    /// Item name
    pub name: String,
    /// Item weight
    pub weight: i32,
    /// Ratings to create
    #[serde(default)]
    pub ratings: Vec<RatingSummary>,
    /// Commentary to create
    #[serde(default)]
    pub commentary: Vec<CommentarySummary>,
}

impl AggregateSpec {
    /// The item record this request creates.
    #[must_use]
    pub fn item(&self) -> Item {
        Item::new(self.id, self.name.clone(), self.weight)
    }

    /// The rating records this request creates.
    #[must_use]
    pub fn rating_records(&self) -> Vec<Rating> {
        self.ratings
            .iter()
            .cloned()
            .map(|r| r.into_rating(self.id))
            .collect()
    }

    /// The commentary records this request creates.
    #[must_use]
    pub fn commentary_records(&self) -> Vec<Commentary> {
        self.commentary
            .iter()
            .cloned()
            .map(|c| c.into_commentary(self.id))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn rating(address: &str) -> Rating {
        Rating {
            item_id: 1,
            rating_id: 1,
            author: "author".to_string(),
            rate: 4,
            content: "content".to_string(),
            origin_address: Some(address.to_string()),
        }
    }

    #[test]
    fn item_write_form_omits_origin_address() {
        let json = serde_json::to_value(Item::new(1, "n", 1)).unwrap();
        assert_eq!(json, serde_json::json!({ "id": 1, "name": "n", "weight": 1 }));
    }

    #[test]
    fn assemble_takes_addresses_from_first_records() {
        let mut item = Item::new(7, "lamp", 3);
        item.origin_address = Some("item-1:7001".to_string());

        let view = AggregateView::assemble(
            item,
            &[rating("ratings-a:7002"), rating("ratings-b:7002")],
            &[],
            "composite:7000",
        );

        assert_eq!(view.id, 7);
        assert_eq!(view.ratings.len(), 2);
        assert!(view.commentary.is_empty());
        assert_eq!(view.service_addresses.composite, "composite:7000");
        assert_eq!(view.service_addresses.item, "item-1:7001");
        assert_eq!(view.service_addresses.ratings, "ratings-a:7002");
        assert_eq!(view.service_addresses.commentary, "");
    }

    #[test]
    fn spec_without_lists_deserializes_empty() {
        let spec: AggregateSpec =
            serde_json::from_str(r#"{"id":3,"name":"n","weight":2}"#).unwrap();
        assert!(spec.ratings.is_empty());
        assert!(spec.commentary.is_empty());
        assert_eq!(spec.item(), Item::new(3, "n", 2));
    }

    #[test]
    fn spec_records_reference_the_item() {
        let spec = AggregateSpec {
            id: 9,
            name: "n".to_string(),
            weight: 1,
            ratings: vec![RatingSummary {
                rating_id: 2,
                author: "a".to_string(),
                rate: 5,
                content: "c".to_string(),
            }],
            commentary: vec![CommentarySummary {
                commentary_id: 4,
                author: "a".to_string(),
                subject: "s".to_string(),
                content: "c".to_string(),
            }],
        };

        let ratings = spec.rating_records();
        let commentary = spec.commentary_records();
        assert_eq!(ratings[0].item_id, 9);
        assert_eq!(ratings[0].origin_address, None);
        assert_eq!(commentary[0].item_id, 9);
        assert_eq!(commentary[0].commentary_id, 4);
    }
}
