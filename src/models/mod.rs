pub mod config;
pub mod konfig;

pub use config::*;
pub use konfig::{
    konfig_id, Endpoint, Endpoints, Environments, Konfig, Konfigs, UsedKonfig, KODING_BASE_URL,
};
