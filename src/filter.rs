//! Search filters in the shape the Planet Data API expects.
//!
//! Every filter serializes as `{"type": ..., "field_name": ..., "config": ...}`; the
//! `AndFilter` carries its children as the `config` array, in insertion order.
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};

pub const GEOMETRY_FIELD: &str = "geometry";
pub const ACQUIRED_FIELD: &str = "acquired";
pub const CLOUD_COVER_FIELD: &str = "cloud_cover";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum Geometry {
    Polygon { coordinates: Vec<Vec<[f64; 2]>> },
}

impl Geometry {
    /// A polygon with a single exterior ring of `[lon, lat]` pairs.
    pub fn polygon(ring: &[[f64; 2]]) -> Self {
        Self::Polygon {
            coordinates: vec![ring.to_vec()],
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct DateRange {
    #[serde(serialize_with = "serialize_millis")]
    pub gte: DateTime<Utc>,
    #[serde(serialize_with = "serialize_millis")]
    pub lte: DateTime<Utc>,
}

impl DateRange {
    pub fn new(gte: DateTime<Utc>, lte: DateTime<Utc>) -> Self {
        Self { gte, lte }
    }
}

fn serialize_millis<S: Serializer>(
    value: &DateTime<Utc>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct NumericRange {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub gte: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub lte: Option<f64>,
}

impl NumericRange {
    pub fn at_most(lte: f64) -> Self {
        Self {
            gte: None,
            lte: Some(lte),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum SearchFilter {
    GeometryFilter {
        field_name: String,
        config: Geometry,
    },
    DateRangeFilter {
        field_name: String,
        config: DateRange,
    },
    RangeFilter {
        field_name: String,
        config: NumericRange,
    },
    AndFilter {
        config: Vec<SearchFilter>,
    },
}

impl SearchFilter {
    pub fn geometry(region: &[[f64; 2]]) -> Self {
        Self::GeometryFilter {
            field_name: GEOMETRY_FIELD.to_string(),
            config: Geometry::polygon(region),
        }
    }

    pub fn date_range(field: &str, range: DateRange) -> Self {
        Self::DateRangeFilter {
            field_name: field.to_string(),
            config: range,
        }
    }

    pub fn range(field: &str, bound: NumericRange) -> Self {
        Self::RangeFilter {
            field_name: field.to_string(),
            config: bound,
        }
    }

    pub fn and(children: Vec<SearchFilter>) -> Self {
        Self::AndFilter { config: children }
    }
}

/// Body of a quick-search request.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub item_types: Vec<String>,
    pub filter: SearchFilter,
}

/// Combines the geometry, acquisition date and cloud cover filters, in that order.
///
/// Inputs are passed through as given; the remote API decides what is valid.
pub fn build_search_request(
    region: &[[f64; 2]],
    date_range: &DateRange,
    max_cloud_cover: f64,
    item_type: &str,
) -> SearchRequest {
    let filter = SearchFilter::and(vec![
        SearchFilter::geometry(region),
        SearchFilter::date_range(ACQUIRED_FIELD, date_range.clone()),
        SearchFilter::range(CLOUD_COVER_FIELD, NumericRange::at_most(max_cloud_cover)),
    ]);
    SearchRequest {
        item_types: vec![item_type.to_string()],
        filter,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn unit_square() -> Vec<[f64; 2]> {
        vec![[0., 0.], [1., 0.], [1., 1.], [0., 1.], [0., 0.]]
    }

    fn august_31() -> DateRange {
        DateRange::new(
            Utc.with_ymd_and_hms(2016, 8, 31, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2016, 9, 1, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_request_json_shape() {
        let request = build_search_request(&unit_square(), &august_31(), 0.5, "PSScene");
        let value = serde_json::to_value(&request).unwrap();

        let expected = json!({
            "item_types": ["PSScene"],
            "filter": {
                "type": "AndFilter",
                "config": [
                    {
                        "type": "GeometryFilter",
                        "field_name": "geometry",
                        "config": {
                            "type": "Polygon",
                            "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]
                        }
                    },
                    {
                        "type": "DateRangeFilter",
                        "field_name": "acquired",
                        "config": {
                            "gte": "2016-08-31T00:00:00.000Z",
                            "lte": "2016-09-01T00:00:00.000Z"
                        }
                    },
                    {
                        "type": "RangeFilter",
                        "field_name": "cloud_cover",
                        "config": { "lte": 0.5 }
                    }
                ]
            }
        });
        assert_eq!(value, expected);
    }

    #[test]
    fn test_request_deserializes_to_conjunction_in_order() {
        let request = build_search_request(&unit_square(), &august_31(), 0.1, "PSScene");
        let text = serde_json::to_string(&request).unwrap();
        let parsed: SearchRequest = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, request);

        let SearchFilter::AndFilter { config } = parsed.filter else {
            panic!("expected an AndFilter at the top level");
        };
        assert_eq!(config.len(), 3);
        assert!(matches!(config[0], SearchFilter::GeometryFilter { .. }));
        assert!(matches!(config[1], SearchFilter::DateRangeFilter { .. }));
        assert!(matches!(
            &config[2],
            SearchFilter::RangeFilter { field_name, config } if field_name == CLOUD_COVER_FIELD && config.lte == Some(0.1)
        ));
    }

    #[test]
    fn test_open_ring_is_passed_through() {
        let ring = vec![[10., 10.], [11., 10.], [11., 11.]];
        let filter = SearchFilter::geometry(&ring);
        let value = serde_json::to_value(&filter).unwrap();
        assert_eq!(value["config"]["coordinates"][0].as_array().unwrap().len(), 3);
    }
}
