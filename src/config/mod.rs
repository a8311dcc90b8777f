pub mod service_settings;
pub mod services;
