pub mod catalogue_service;
pub mod collection;
pub mod importer;
pub mod metadata_store;
pub mod normalize;
pub mod reconciler;
pub mod subcategory_store;
pub mod tabular;
pub mod thumbnail;
