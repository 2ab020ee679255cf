use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;

use lakeplan_engine::content::{LAKES_RESOURCE, ROUTES_RESOURCE};
use lakeplan_engine::{BundledContent, ContentCache, ContentLoader, LakeCatalog, RouteCatalog};

/// Content read from files given on the command line, falling back to the
/// catalogs bundled with the engine.
#[derive(Debug, Clone, Default)]
pub struct FileContent {
    pub lakes: Option<PathBuf>,
    pub routes: Option<PathBuf>,
}

impl ContentLoader for FileContent {
    type Error = io::Error;

    fn load_text(&self, resource: &str) -> Result<String, Self::Error> {
        let path = match resource {
            LAKES_RESOURCE => self.lakes.as_ref(),
            ROUTES_RESOURCE => self.routes.as_ref(),
            _ => None,
        };
        match path {
            Some(path) => fs::read_to_string(path),
            None => BundledContent.load_text(resource).map_err(io::Error::other),
        }
    }
}

/// Validated catalogs shared by every scenario run.
#[derive(Debug, Clone)]
pub struct TesterAssets {
    pub loader: FileContent,
    pub lakes: Rc<LakeCatalog>,
    pub routes: Rc<RouteCatalog>,
}

impl TesterAssets {
    pub fn load_default() -> Result<Self> {
        Self::load(FileContent::default())
    }

    pub fn load(loader: FileContent) -> Result<Self> {
        let mut cache = ContentCache::new(loader.clone());
        let lakes = cache.lakes().context("loading lake catalog")?;
        let routes = cache.routes().context("loading route catalog")?;
        log::info!(
            "tester assets ready: {} lakes, {} route options",
            lakes.len(),
            routes.options.len()
        );
        Ok(Self {
            loader,
            lakes,
            routes,
        })
    }
}
