// Domain layer modules
pub mod domain;

// Audio processing modules
pub mod audio;

// Application layer modules
pub mod application;

// Infrastructure layer modules
pub mod infrastructure;
