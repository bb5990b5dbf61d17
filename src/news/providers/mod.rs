pub mod headline_api;
