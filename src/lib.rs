pub mod capture;
pub mod configuration;
pub mod controller;
pub mod error_handling;
pub mod hub;
pub mod ingress;
pub mod registry;
pub mod relay;
pub mod web_interface;
