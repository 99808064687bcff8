pub mod catalogue_handlers;
pub mod health_handlers;
pub mod image_handlers;
pub mod metadata_handlers;
