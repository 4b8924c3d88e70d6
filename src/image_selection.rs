use crate::filter::{build_search_request, DateRange, SearchRequest};
use crate::poll::{PollPolicy, PollSettings};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use toml;

/// One imagery query, read from a TOML file.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ImageSelection {
    pub id: String,
    name: String,
    description: String,
    pub item_type: String,
    pub asset_kind: String,
    /// Exterior ring of the area of interest as `[lon, lat]` pairs, first == last.
    region: Vec<[f64; 2]>,
    acquired_from: DateTime<Utc>,
    acquired_to: DateTime<Utc>,
    max_cloud_cover: f64,
    /// Download only the first `limit` search results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    limit: Option<usize>,
    #[serde(default)]
    polling: PollSettings,
}

impl ImageSelection {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let selection: Self = toml::from_str(&content)?;
        Ok(selection)
    }

    pub fn write<P: AsRef<Path>>(self: &Self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn from_template(table: &toml::Table) -> Result<Self> {
        let selection: Self = toml::from_str(&table.to_string())?;
        Ok(selection)
    }

    pub fn date_range(self: &Self) -> DateRange {
        DateRange::new(self.acquired_from, self.acquired_to)
    }

    pub fn search_request(self: &Self) -> SearchRequest {
        build_search_request(
            &self.region,
            &self.date_range(),
            self.max_cloud_cover,
            &self.item_type,
        )
    }

    pub fn poll_policy(self: &Self) -> PollPolicy {
        PollPolicy::from(&self.polling)
    }

    pub fn limit(self: &Self) -> Option<usize> {
        self.limit
    }

    pub fn set_limit(self: &mut Self, limit: Option<usize>) {
        self.limit = limit;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::SearchFilter;
    use crate::planet::psscene;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_template() {
        let selection = ImageSelection::from_template(&psscene::image_selection_toml()).unwrap();
        assert_eq!(selection.id, "planet.psscene.sacramento-delta");
        assert_eq!(selection.item_type, psscene::ITEM_TYPE);
        assert_eq!(selection.asset_kind, psscene::ORTHO_ANALYTIC_4B);
        assert_eq!(selection.region.len(), 5);
        assert_eq!(selection.region.first(), selection.region.last());
        assert_eq!(selection.limit(), None);
        assert_eq!(selection.poll_policy().delay_for(1), Duration::from_secs(2));
    }

    #[test]
    fn test_write_then_read_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("image_selection.toml");
        let mut selection =
            ImageSelection::from_template(&psscene::image_selection_toml()).unwrap();
        selection.set_limit(Some(2));
        selection.write(&path).unwrap();

        let read = ImageSelection::read(&path).unwrap();
        assert_eq!(read, selection);
        assert_eq!(read.limit(), Some(2));
    }

    #[test]
    fn test_polling_table_is_optional() {
        let content = r#"
            id = "minimal"
            name = "Minimal"
            description = ""
            item_type = "PSScene"
            asset_kind = "ortho_visual"
            region = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]
            acquired_from = "2016-08-31T00:00:00Z"
            acquired_to = "2016-09-01T00:00:00Z"
            max_cloud_cover = 0.5
        "#;
        let selection: ImageSelection = toml::from_str(content).unwrap();
        assert_eq!(selection.polling, PollSettings::default());
    }

    #[test]
    fn test_search_request_from_selection() {
        let selection = ImageSelection::from_template(&psscene::image_selection_toml()).unwrap();
        let request = selection.search_request();
        assert_eq!(request.item_types, vec!["PSScene".to_string()]);
        let SearchFilter::AndFilter { config } = request.filter else {
            panic!("expected an AndFilter");
        };
        assert_eq!(config.len(), 3);
    }
}
