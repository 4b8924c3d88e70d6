//! Planet Data API: quick search, asset activation and content retrieval.
mod assets;
mod provider;
mod search;

pub use assets::{list_assets, resolve_active_asset, Asset, AssetLinks, AssetMap, AssetStatus};
pub use provider::Provider;
pub use search::{parse_feature_ids, search, ItemId};

pub mod psscene {
    //! The PlanetScope scene query the download scripts were written for.

    pub const ITEM_TYPE: &str = "PSScene";
    pub const ORTHO_ANALYTIC_4B: &str = "ortho_analytic_4b";

    const TEMPLATE: &str = r#"
id = "planet.psscene.sacramento-delta"

name = "PlanetScope 4-band orthorectified scenes"

description = """
Orthorectified, radiometrically calibrated 4-band (RGB + NIR) PlanetScope scenes
over the Sacramento-San Joaquin delta, acquired on 2016-08-31 with at most 50%
cloud cover."""

item_type = "PSScene"
asset_kind = "ortho_analytic_4b"

region = [
    [-121.59290313720705, 37.93444993515032],
    [-121.27017974853516, 37.93444993515032],
    [-121.27017974853516, 38.065932950547484],
    [-121.59290313720705, 38.065932950547484],
    [-121.59290313720705, 37.93444993515032],
]

acquired_from = "2016-08-31T00:00:00Z"
acquired_to = "2016-09-01T00:00:00Z"
max_cloud_cover = 0.5

[polling]
max_attempts = 60
base_delay_ms = 2000
max_delay_ms = 30000
multiplier = 1.5
"#;

    pub fn image_selection_toml() -> toml::Table {
        TEMPLATE
            .parse()
            .expect("Built-in image selection template should always parse")
    }
}
