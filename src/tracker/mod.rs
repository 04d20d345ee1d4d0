// Position change detection and the upload pipeline it feeds.
pub mod location;
pub mod upload;
