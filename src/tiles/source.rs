use crate::core::config::TileSourceConfig;
use crate::core::geo::TileCoord;

/// Trait representing anything that can produce tile URLs for a given coordinate.
pub trait TileSource: Send + Sync {
    /// Build a URL for the requested `coord`.
    fn url(&self, coord: TileCoord) -> String;
}

/// Tile source addressed by a URL template with `{z}`, `{x}`, `{y}` and
/// optional `{s}` (subdomain) placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct UrlTemplateSource {
    template: String,
    subdomains: Vec<String>,
}

impl UrlTemplateSource {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            subdomains: Vec::new(),
        }
    }

    pub fn with_subdomains<I, S>(mut self, subdomains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subdomains = subdomains.into_iter().map(Into::into).collect();
        self
    }

    /// The default OpenStreetMap tile server
    pub fn openstreetmap() -> Self {
        Self::from_config(&TileSourceConfig::default())
    }

    pub fn from_config(config: &TileSourceConfig) -> Self {
        Self::new(config.url_template.clone()).with_subdomains(config.subdomains.clone())
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

impl Default for UrlTemplateSource {
    fn default() -> Self {
        Self::openstreetmap()
    }
}

impl TileSource for UrlTemplateSource {
    fn url(&self, coord: TileCoord) -> String {
        let coord = coord.wrapped();
        let mut url = self
            .template
            .replace("{z}", &coord.z.to_string())
            .replace("{x}", &coord.x.to_string())
            .replace("{y}", &coord.y.to_string());

        if !self.subdomains.is_empty() {
            let idx = ((coord.x + coord.y).rem_euclid(self.subdomains.len() as i64)) as usize;
            url = url.replace("{s}", &self.subdomains[idx]);
        }
        url
    }
}
